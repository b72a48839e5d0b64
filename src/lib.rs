pub mod error;
pub mod types;
pub mod physics;
pub mod fleur_parsers;
pub mod selection;
pub mod weights;
pub mod dos_projection;
pub mod display;
pub mod settings;
pub mod commands;
pub mod cli;

pub use types::Result;
pub use cli::OptProcess;
pub use error::FleurError;

pub use fleur_parsers::{
    banddos::{
        BandData,
        RawBandData,
        CHARACTER_NAMES,
    },
    dostable::{
        DosTable,
        DosLayout,
    },
};

pub use selection::Selection;

pub use weights::{
    WeightOptions,
    BandWeights,
    CharacterComparison,
    PointCloud,
    ColoredPointCloud,
    band_weights,
    compare_characters,
    compare_character_pair,
    group_multiplicities,
    flatten,
};

pub use dos_projection::{
    DosOptions,
    DosCurve,
    project_dos,
    layout_multiplicities,
};

pub use display::DisplayValues;

pub use settings::Settings;
