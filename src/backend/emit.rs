use cranelift_codegen::{
    ir::Function, print_errors::pretty_verifier_error, settings,
    verify_function,
};
use thiserror::Error;
use tracing::debug;

use super::translator::{translate, TranslateError, TranslationStats, TranslatorConfig};

#[derive(Error, Debug)]
pub enum EmitError {
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error("generated IR failed verification:\n{0}")]
    Verification(String),
}

pub struct Emitted {
    pub text: String,
    pub stats: TranslationStats,
}

pub fn verify(function: &Function) -> Result<(), EmitError> {
    let flags = settings::Flags::new(settings::builder());

    verify_function(function, &flags).map_err(|errors| {
        EmitError::Verification(pretty_verifier_error(function, None, errors))
    })
}

pub fn print(function: &Function, module_name: &str) -> String {
    format!("; module: {}\n{}", module_name, function.display())
}

/// Translate, verify and print in one go.
pub fn emit(
    source: &[u8],
    config: &TranslatorConfig,
) -> Result<Emitted, EmitError> {
    let translation = translate(source, config)?;

    verify(&translation.function)?;
    debug!(
        blocks = translation.function.layout.blocks().count(),
        "verified function"
    );

    Ok(Emitted {
        text: print(&translation.function, &config.module_name),
        stats: translation.stats,
    })
}
