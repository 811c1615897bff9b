//! Properties that must hold for every program, checked against generated
//! sources.

use bfir::backend::{translate, verify, TranslateError, Translator, TranslatorConfig};
use bfir::frontend::SourceCursor;
use bfir::test_helpers::{shape, translate_default};
use cranelift_codegen::ir::Function;
use cranelift_frontend::FunctionBuilderContext;
use proptest::prelude::*;

/// Programs whose brackets always match.
fn balanced() -> impl Strategy<Value = String> {
    let leaf = prop::sample::select(vec!["+", "-", ">", "<", ".", ","])
        .prop_map(String::from);

    leaf.prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(|parts| parts.concat()),
            inner.prop_map(|body| format!("[{}]", body)),
        ]
    })
}

/// A balanced program plus one chunk of comment text per gap.
fn balanced_with_noise() -> impl Strategy<Value = (String, Vec<String>)> {
    balanced().prop_flat_map(|program| {
        let gaps = program.len() + 1;
        (
            Just(program),
            prop::collection::vec("[a-zA-Z0-9 #\n]{0,4}", gaps),
        )
    })
}

fn interleave(program: &str, noise: &[String]) -> String {
    let mut out = String::new();
    for (c, comment) in program.chars().zip(noise) {
        out.push_str(comment);
        out.push(c);
    }
    if let Some(tail) = noise.last() {
        out.push_str(tail);
    }
    out
}

proptest! {
    #[test]
    fn balanced_programs_translate_and_verify(program in balanced()) {
        let translation = translate(program.as_bytes(), &TranslatorConfig::default()).unwrap();

        let opens = program.matches('[').count();
        prop_assert_eq!(translation.stats.loops, opens);
        prop_assert_eq!(shape(&translation.function).blocks, 2 * opens + 1);
        prop_assert!(verify(&translation.function).is_ok());
    }

    #[test]
    fn comments_never_change_the_shape((program, noise) in balanced_with_noise()) {
        let noisy = interleave(&program, &noise);

        prop_assert_eq!(
            shape(&translate_default(&program)),
            shape(&translate_default(&noisy))
        );
    }

    #[test]
    fn stray_close_fails_where_it_stands(prefix in balanced(), suffix in "[\\[\\]+\\-<>.,a-z]{0,16}") {
        let source = format!("{}]{}", prefix, suffix);

        match translate(source.as_bytes(), &TranslatorConfig::default()) {
            Err(TranslateError::UnmatchedCloseBracket(at)) => {
                prop_assert_eq!(at.offset, prefix.len())
            }
            _ => prop_assert!(false, "expected an unmatched ']' in {:?}", source),
        }
    }

    #[test]
    fn nothing_is_emitted_past_a_stray_close(prefix in balanced(), suffix in "[\\[\\]+\\-<>.,a-z]{0,16}") {
        let source = format!("{}]{}", prefix, suffix);
        let mut function = Function::new();
        let mut context = FunctionBuilderContext::new();
        let mut translator =
            Translator::new(&mut function, &mut context, &TranslatorConfig::default()).unwrap();

        for (at, command) in SourceCursor::new(source.as_bytes()) {
            let _ = translator.command(at, command);
        }
        prop_assert_eq!(translator.stats().commands, prefix.len());
        drop(translator);

        let opens = prefix.matches('[').count();
        prop_assert_eq!(function.dfg.num_blocks(), 2 * opens + 1);
    }

    #[test]
    fn unclosed_open_is_reported(before in balanced(), inside in balanced()) {
        let source = format!("{}[{}", before, inside);

        match translate(source.as_bytes(), &TranslatorConfig::default()) {
            Err(TranslateError::UnmatchedOpenBracket(at)) => {
                prop_assert_eq!(at.offset, before.len())
            }
            _ => prop_assert!(false, "expected an unclosed '[' in {:?}", source),
        }
    }

    #[test]
    fn nesting_depth_is_unbounded(depth in 0usize..256) {
        let source = format!("{}{}", "[".repeat(depth), "]".repeat(depth));
        let translation = translate(source.as_bytes(), &TranslatorConfig::default()).unwrap();

        prop_assert_eq!(translation.stats.max_depth, depth);
        prop_assert_eq!(shape(&translation.function).blocks, 2 * depth + 1);
    }
}
