use std::path::PathBuf;

use clap::Args;
use log::{
    info,
    warn,
};

use crate::{
    fleur_ensure,
    types::{
        Result,
        Vector,
    },
    OptProcess,
    settings::Settings,
    fleur_parsers::{
        banddos::{
            BandData,
            CHARACTER_NAMES,
        },
        dostable::{
            DosTable,
            DosLayout,
        },
    },
    selection::{
        group_mask,
        character_mask,
    },
    dos_projection::{
        project_dos,
        layout_multiplicities,
        DosOptions,
    },
    commands::common::{
        write_array_to_txt,
        RawSelection,
        SelectionConfig,
    },
};


#[derive(Debug, Args)]
/// Project Fleur's DOS tables (`DOS.1`, `DOS.2`) onto atom groups and orbital characters.
///
/// The output holds the energy column followed by one column per selection.
pub struct Dos {
    #[arg(default_value = "./DOS.1")]
    /// DOS table file name.
    dos: PathBuf,

    #[arg(short, long)]
    /// Selection file in TOML format, see `--gen-template`.
    ///
    /// When present, `--groups`, `--characters`, `--interstitial`, `--vacuum` and `--factor`
    /// are ignored.
    config: Option<PathBuf>,

    #[arg(long)]
    /// Generate a selection template file `rsfleur_selection.toml` and exit.
    gen_template: bool,

    #[arg(long)]
    /// Atom group ids counting from 1, ranges allowed, e.g. "1..3 -1". All groups by default.
    groups: Option<String>,

    #[arg(long)]
    /// Orbital characters, e.g. "s p". All characters by default.
    characters: Option<String>,

    #[arg(long)]
    /// Add the interstitial contribution.
    interstitial: bool,

    #[arg(long)]
    /// Add both vacuum contributions.
    vacuum: bool,

    #[arg(long)]
    /// Scale of the projected curve.
    factor: Option<f64>,

    #[arg(short = 'b', long)]
    /// banddos.hdf of the same run, supplies the number of atoms of each group.
    banddos: Option<PathBuf>,

    #[arg(short = 'm', long, num_args(1..))]
    /// Number of atoms of each group, one value per group. Overrides `--banddos`.
    ///
    /// 1 for every group when neither this nor `--banddos` is given.
    multiplicity: Vec<f64>,

    #[arg(long)]
    /// Count every atom group once regardless of its number of atoms.
    ignore_group_multiplicity: bool,

    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(1..=4))]
    /// Number of orbital characters per group in the table.
    num_characters: u8,

    #[arg(short = 'o', long, default_value = "dos.txt")]
    /// Output file name.
    txtout: PathBuf,
}


impl Dos {
    fn raw_selections(&self) -> Result<Vec<RawSelection>> {
        if let Some(config) = self.config.as_ref() {
            return Ok(SelectionConfig::from_file(config)?.selection);
        }

        Ok(vec![RawSelection {
            characters:   self.characters.clone(),
            groups:       self.groups.clone(),
            factor:       self.factor,
            interstitial: Some(self.interstitial),
            vacuum:       Some(self.vacuum),
            ..Default::default()
        }])
    }

    fn multiplicities(&self, layout: &DosLayout) -> Result<Vec<f64>> {
        if !self.multiplicity.is_empty() {
            fleur_ensure!(self.multiplicity.len() == layout.num_groups, Shape,
                "{} multiplicities given for {} atom groups", self.multiplicity.len(), layout.num_groups);
            return Ok(self.multiplicity.clone());
        }

        let mut opts = Settings::from_default()?.weight_options();
        if self.ignore_group_multiplicity {
            opts.ignore_group_multiplicity = true;
        }

        match self.banddos.as_ref() {
            Some(path) => {
                let data = BandData::from_file(path)?;
                layout_multiplicities(&data, layout, &opts)
            },
            None => {
                if !opts.ignore_group_multiplicity {
                    warn!("No `--banddos` or `--multiplicity` given, every atom group counts once.");
                }
                Ok(vec![1.0; layout.num_groups])
            },
        }
    }
}


impl OptProcess for Dos {
    fn process(&self) -> Result<()> {
        if self.gen_template {
            return SelectionConfig::write_template("rsfleur_selection.toml");
        }

        let table = DosTable::from_file(&self.dos)?;
        let layout = table.layout(self.num_characters as usize)?;
        info!("DOS table holds {} atom groups with characters {:?}",
              layout.num_groups, &CHARACTER_NAMES[.. layout.num_characters]);

        let multiplicities = self.multiplicities(&layout)?;

        let mut labels = vec![];
        let mut curves = vec![];
        for (i, raw) in self.raw_selections()?.iter().enumerate() {
            let igroups = RawSelection::parse_igroups(raw.groups.as_deref(), layout.num_groups)?;
            let ichars = RawSelection::parse_icharacters(raw.characters.as_deref(), layout.num_characters)?;
            let opts = DosOptions {
                interstitial: raw.interstitial.unwrap_or(false),
                vacuum:       raw.vacuum.unwrap_or(false),
            };

            let curve = project_dos(&table, &layout,
                                    &group_mask(Some(&igroups), layout.num_groups)?,
                                    &character_mask(Some(&ichars), layout.num_characters)?,
                                    &multiplicities, &opts)?;
            labels.push(raw.label_or(i));
            curves.push(curve.dos * raw.factor());
        }

        let energy = table.energies();
        let mut columns: Vec<&Vector<f64>> = vec![&energy];
        columns.extend(curves.iter());

        info!("Writing {} projected DOS curves to {:?}", curves.len(), self.txtout);
        write_array_to_txt(&self.txtout, columns, &format!("E  {}", labels.join("  ")))
    }
}
