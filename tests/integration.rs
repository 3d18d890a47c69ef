//! Integration tests: grammar evaluation, backtracking, recursion, limits and expressions.

use binmetal::ast::{
    cho, def, def_if, def_sized, fix, greedy, let_, nod, pre, rep, repn, self_ref, seq, seq_enc, sub,
};
use binmetal::expr::{con, con_bytes, eq, eq_num, eq_num_of, eq_of, gt_num, last, lt_num, masked_eq, nesting, Expr};
use binmetal::history::Record;
use binmetal::{parse, DecodeOptions, Encoding, Environment, Format, ParseError, SliceSource, Token};
use std::sync::Arc;

fn run<'a>(token: &Arc<Token>, src: &'a SliceSource<'a>) -> Result<Environment<'a>, ParseError> {
    let env = Environment::new(src);
    parse(token, &env, &Encoding::default(), &DecodeOptions::default())
}

fn names(env: &Environment<'_>) -> Vec<String> {
    env.history().entries().iter().map(|e| e.name.clone()).collect()
}

#[test]
fn test_choice_discards_failed_alternative() {
    // First alternative consumes 3 bytes, then fails on its fourth.
    let first = seq(
        "first",
        vec![def("a1", 3), def_if("a2", 1, eq_num(con(0xff)))],
    );
    let second = seq("second", vec![def("b1", 2), def("b2", 2)]);
    let choice = cho("choice", vec![first, second.clone()]);

    let data = [1u8, 2, 3, 4, 5];
    let src = SliceSource::new(&data);
    let chosen = run(&choice, &src).expect("second alternative matches");
    let alone = run(&second, &src).expect("second alone");

    assert_eq!(names(&chosen), vec!["b1", "b2"]);
    assert_eq!(names(&chosen), names(&alone));
    assert_eq!(chosen.history().len(), alone.history().len());
    assert_eq!(chosen.offset(), 4);
    assert!(chosen.history().last("a1").is_none());
}

#[test]
fn test_choice_all_alternatives_failed() {
    let choice = cho(
        "magic",
        vec![
            def_if("MZ", 2, eq(con_bytes(b"MZ"))),
            def_if("ZM", 2, eq(con_bytes(b"ZM"))),
        ],
    );
    let data = *b"PK";
    let src = SliceSource::new(&data);
    let err = run(&choice, &src).unwrap_err();
    assert_eq!(
        err,
        ParseError::AllAlternativesFailed {
            name: "magic".to_string(),
            offset: 0,
            tried: 2,
        }
    );
}

#[test]
fn test_insufficient_data_leaves_environment_unchanged() {
    let data = [0u8; 4];
    let src = SliceSource::new(&data);
    let env = Environment::new(&src).seek(1);
    let before = env.clone();

    let err = parse(&def("big", 10), &env, &Encoding::default(), &DecodeOptions::default()).unwrap_err();
    assert_eq!(
        err,
        ParseError::InsufficientData {
            offset: 1,
            requested: 10,
            available: 3,
        }
    );
    assert!(env.same_state(&before));
    assert_eq!(env.offset(), 1);
    assert!(env.history().is_empty());

    let err = parse(&nod(con(4)), &env, &Encoding::default(), &DecodeOptions::default()).unwrap_err();
    assert!(matches!(err, ParseError::InsufficientData { requested: 4, .. }));
}

#[test]
fn test_predicate_mismatch() {
    let data = [7u8];
    let src = SliceSource::new(&data);
    let err = run(&def_if("flag", 1, lt_num(con(5))), &src).unwrap_err();
    assert_eq!(
        err,
        ParseError::PredicateMismatch {
            name: "flag".to_string(),
            offset: 0,
        }
    );
}

#[test]
fn test_sub_parses_at_offset_and_restores_cursor() {
    let grammar = seq(
        "s",
        vec![
            def("ptr", 1),
            sub(def("target", 2), last("ptr")),
            def("after", 1),
        ],
    );
    let data = [4u8, 0xaa, 0, 0, 0x12, 0x34];
    let src = SliceSource::new(&data);
    let env = run(&grammar, &src).unwrap();
    let target = env.history().last("target").unwrap();
    assert_eq!(target.offset, 4);
    assert_eq!(target.as_int(), Some(0x1234));
    assert_eq!(env.history().last("after").unwrap().data, vec![0xaa]);
    assert_eq!(env.offset(), 2);
}

#[test]
fn test_sized_field_from_history() {
    let grammar = seq(
        "tlv",
        vec![def("type", 1), def("length", 2), def_sized("value", last("length"), Expr::True)],
    );
    let data = [1u8, 0, 3, b'a', b'b', b'c', 0xff];
    let src = SliceSource::new(&data);
    let env = run(&grammar, &src).unwrap();
    assert_eq!(env.history().last("value").unwrap().as_text(), "abc");
    assert_eq!(env.offset(), 6);
}

#[test]
fn test_encoding_override_on_sequence() {
    let grammar = seq_enc("le", Encoding::little_endian(), vec![def("word", 2)]);
    let data = [0x34u8, 0x12];
    let src = SliceSource::new(&data);
    let env = run(&grammar, &src).unwrap();
    assert_eq!(env.history().last("word").unwrap().as_int(), Some(0x1234));
}

fn linked_list() -> Arc<Token> {
    fix(
        "node",
        seq(
            "entry",
            vec![
                def("has_next", 1),
                let_("level", nesting("node")),
                pre(self_ref("node"), eq_num_of(last("has_next"), con(1))),
            ],
        ),
    )
}

#[test]
fn test_self_reference_recurses_with_distinct_scopes() {
    let data = [1u8, 1, 1, 0, 9];
    let src = SliceSource::new(&data);
    let env = run(&linked_list(), &src).unwrap();
    assert_eq!(env.offset(), 4);

    let levels: Vec<i128> = env
        .history()
        .entries()
        .iter()
        .filter(|e| e.name == "level")
        .filter_map(|e| e.as_int())
        .collect();
    assert_eq!(levels, vec![1, 2, 3, 4]);

    let scopes: Vec<u32> = env
        .history()
        .entries()
        .iter()
        .filter(|e| e.name == "has_next")
        .map(|e| e.scope)
        .collect();
    let mut unique = scopes.clone();
    unique.dedup();
    assert_eq!(unique.len(), 4);
}

#[test]
fn test_scope_ids_are_deterministic() {
    let data = [1u8, 1, 0];
    let src = SliceSource::new(&data);
    let scopes = |env: &Environment<'_>| -> Vec<u32> {
        env.history()
            .records()
            .iter()
            .filter_map(|r| match r {
                Record::Enter { scope, .. } => Some(*scope),
                _ => None,
            })
            .collect()
    };
    let a = run(&linked_list(), &src).unwrap();
    let b = run(&linked_list(), &src).unwrap();
    assert_eq!(scopes(&a), scopes(&b));
    assert!(!scopes(&a).is_empty());
}

#[test]
fn test_unbounded_recursion_is_a_clean_error() {
    let looping = fix("loop", seq("body", vec![self_ref("loop")]));
    let data = [0u8; 4];
    let src = SliceSource::new(&data);
    let err = run(&looping, &src).unwrap_err();
    assert!(matches!(err, ParseError::RecursionLimitExceeded(_)));
}

#[test]
fn test_self_ref_without_anchor() {
    let data = [0u8];
    let src = SliceSource::new(&data);
    let err = run(&self_ref("missing"), &src).unwrap_err();
    assert!(matches!(err, ParseError::ExpressionInapplicable(_)));
}

#[test]
fn test_rep_stops_at_first_failure() {
    let grammar = rep("small", def_if("x", 1, lt_num(con(10))));
    let data = [1u8, 2, 3, 50, 4];
    let src = SliceSource::new(&data);
    let env = run(&grammar, &src).unwrap();
    assert_eq!(env.offset(), 3);
    assert_eq!(names(&env), vec!["x", "x", "x"]);
}

#[test]
fn test_rep_without_progress_terminates() {
    let grammar = rep("empty", nod(con(0)));
    let data = [1u8, 2];
    let src = SliceSource::new(&data);
    let env = run(&grammar, &src).unwrap();
    assert_eq!(env.offset(), 0);
}

#[test]
fn test_rep_keeps_successful_iteration_without_progress() {
    // The body reads at a fixed offset, so the cursor never moves.
    let body = seq("it", vec![let_("k", con(1)), sub(def("x", 1), con(0))]);
    let grammar = rep("r", body);
    let data = [7u8, 1, 2];
    let src = SliceSource::new(&data);
    let env = run(&grammar, &src).unwrap();
    assert_eq!(env.offset(), 0);
    assert_eq!(names(&env), vec!["k", "x"]);
    assert_eq!(env.history().last("x").unwrap().data, vec![7]);
}

#[test]
fn test_repn_exact_count_and_limit() {
    let grammar = seq("s", vec![def("count", 1), repn("items", def("item", 1), last("count"))]);
    let data = [3u8, 10, 20, 30, 40];
    let src = SliceSource::new(&data);
    let env = run(&grammar, &src).unwrap();
    assert_eq!(env.offset(), 4);

    let short = [5u8, 1, 2];
    let src = SliceSource::new(&short);
    assert!(matches!(run(&grammar, &src), Err(ParseError::InsufficientData { .. })));

    let opts = DecodeOptions {
        max_repetitions: 3,
        ..DecodeOptions::default()
    };
    let capped = Format::new("capped", grammar, Encoding::default()).with_options(opts);
    let data = [5u8, 1, 2, 3, 4, 5];
    let src = SliceSource::new(&data);
    assert_eq!(
        capped.decode(&src).unwrap_err(),
        ParseError::RepetitionLimitExceeded {
            name: "items".to_string(),
            count: 5,
            limit: 3,
        }
    );
}

#[test]
fn test_exact_division_through_history() {
    let grammar = seq(
        "div",
        vec![
            def("a", 1),
            def("b", 1),
            let_("ceil", last("a").ceil_div(last("b"))),
            let_("floor", last("a").floor_div(last("b"))),
        ],
    );
    let data = [10u8, 3];
    let src = SliceSource::new(&data);
    let env = run(&grammar, &src).unwrap();
    assert_eq!(env.history().last("ceil").unwrap().as_int(), Some(4));
    assert_eq!(env.history().last("floor").unwrap().as_int(), Some(3));
    // constants never move the cursor
    assert_eq!(env.offset(), 2);

    let zero = [10u8, 0];
    let src = SliceSource::new(&zero);
    assert!(matches!(run(&grammar, &src), Err(ParseError::ExpressionInapplicable(_))));
}

#[test]
fn test_missing_reference_fails_predicate() {
    let grammar = def_if("x", 1, eq_num_of(last("nowhere"), con(1)));
    let data = [1u8];
    let src = SliceSource::new(&data);
    assert!(matches!(run(&grammar, &src), Err(ParseError::PredicateMismatch { .. })));
}

#[test]
fn test_masked_state_predicate() {
    let grammar = seq_enc(
        "entry",
        Encoding::little_endian(),
        vec![def_if("state6", 8, masked_eq(0x07, 6))],
    );
    let good = 0x0000_0000_0030_000eu64.to_le_bytes();
    let src = SliceSource::new(&good);
    assert!(run(&grammar, &src).is_ok());

    let bad = 7u64.to_le_bytes();
    let src = SliceSource::new(&bad);
    assert!(run(&grammar, &src).is_err());
}

#[test]
fn test_wide_values_compare_bytewise() {
    let blob: Vec<u8> = (0u8..20).collect();
    let grammar = seq(
        "s",
        vec![
            def("blob", 20),
            pre(def("marker", 0), eq_of(last("blob"), con_bytes(&blob))),
        ],
    );
    let src = SliceSource::new(&blob);
    let env = run(&grammar, &src).unwrap();
    assert!(env.history().last("blob").unwrap().as_int().is_none());
    assert!(env.history().last("marker").is_some());
}

#[test]
fn test_greedy_field_in_sequence() {
    let grammar = seq(
        "line",
        vec![
            greedy("text", gt_num(con(31)).and(lt_num(con(166)))),
            def_if("eol", 2, eq(con_bytes(b"\r\n"))),
        ],
    );
    let data = *b"AB\r\n";
    let src = SliceSource::new(&data);
    let env = run(&grammar, &src).unwrap();
    let text = env.history().last("text").unwrap();
    assert_eq!(text.length, 2);
    assert_eq!(text.offset, 0);
    assert_eq!(env.offset(), 4);
}

#[test]
fn test_grammar_shared_across_threads() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Arc<Token>>();

    let grammar = seq("pair", vec![def("a", 1), def("b", 1)]);
    let inputs: Vec<Vec<u8>> = vec![vec![1, 2], vec![3, 4], vec![5, 6]];
    std::thread::scope(|s| {
        for input in &inputs {
            let grammar = Arc::clone(&grammar);
            s.spawn(move || {
                let src = SliceSource::new(input);
                let env = Environment::new(&src);
                let done = parse(&grammar, &env, &Encoding::default(), &DecodeOptions::default()).unwrap();
                assert_eq!(done.history().last("b").unwrap().data[0], input[1]);
            });
        }
    });
}
