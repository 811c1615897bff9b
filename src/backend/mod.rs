pub mod emit;
pub mod translator;

pub use emit::{emit, print, verify, EmitError, Emitted};
pub use translator::{
    translate, TranslateError, Translation, TranslationStats, Translator,
    TranslatorConfig, DEFAULT_CELL_COUNT,
};
