use std::path::PathBuf;

use clap::Args;
use log::info;

use crate::{
    types::Result,
    OptProcess,
    settings::Settings,
    fleur_parsers::banddos::BandData,
    selection::selected_indices,
    weights::{
        band_weights,
        compare_character_pair,
        WeightOptions,
    },
    commands::common::{
        write_array_to_txt,
        suffixed_path,
        RawSelection,
        SelectionConfig,
    },
};


#[derive(Debug, Args)]
/// Extract orbital- and atom-group-projected band structures from Fleur's banddos.hdf.
///
/// Each selection and spin channel produces one point cloud with columns `k  E-Ef(eV)  weight`,
/// or `k  E-Ef(eV)  color  size` when two characters are compared. Points with a weight
/// (size) below the threshold are dropped.
pub struct Band {
    #[arg(short, long)]
    /// Selection file in TOML format, see `--gen-template`.
    ///
    /// When present, `--spins`, `--characters`, `--groups` and `--bands` are ignored.
    config: Option<PathBuf>,

    #[arg(long)]
    /// Generate a selection template file `rsfleur_selection.toml` and exit.
    gen_template: bool,

    #[arg(short = 'b', long, default_value = "./banddos.hdf")]
    /// banddos.hdf file name.
    banddos: PathBuf,

    #[arg(long)]
    /// Spin channels, `up` and/or `down`. All channels by default.
    spins: Option<String>,

    #[arg(long)]
    /// Orbital characters, e.g. "s p". All characters by default.
    characters: Option<String>,

    #[arg(long)]
    /// Atom group ids counting from 1, ranges allowed, e.g. "1..3 -1". All groups by default.
    groups: Option<String>,

    #[arg(long)]
    /// Band indices counting from 1, same syntax as `--groups`. All bands by default.
    bands: Option<String>,

    #[arg(short, long)]
    /// Exponent applied to the band unfolding weights.
    exponent: Option<f64>,

    #[arg(long)]
    /// Ignore the band unfolding weights even if the file carries them.
    no_unfolding: bool,

    #[arg(long)]
    /// Count every atom group once regardless of its number of atoms.
    ignore_group_multiplicity: bool,

    #[arg(short, long)]
    /// Points with weight less than or equal to this value are dropped.
    threshold: Option<f64>,

    #[arg(long, num_args(2), value_names = ["C1", "C2"])]
    /// Compare two orbital characters: color is the share of C1, size the sum of both.
    ///
    /// The character selection is replaced by C1 and C2.
    compare: Vec<String>,

    #[arg(short = 'o', long, default_value = "band.txt")]
    /// Output file name, suffixed with the selection label and spin when several files are written.
    txtout: PathBuf,
}


impl Band {
    fn weight_options(&self, settings: &Settings) -> WeightOptions {
        let mut opts = settings.weight_options();
        if let Some(e) = self.exponent {
            opts.exponent = e;
        }
        if self.no_unfolding {
            opts.use_unfolding = false;
        }
        if self.ignore_group_multiplicity {
            opts.ignore_group_multiplicity = true;
        }
        opts
    }

    fn raw_selections(&self) -> Result<Vec<RawSelection>> {
        if let Some(config) = self.config.as_ref() {
            return Ok(SelectionConfig::from_file(config)?.selection);
        }

        Ok(vec![RawSelection {
            spins:      self.spins.clone(),
            characters: self.characters.clone(),
            groups:     self.groups.clone(),
            bands:      self.bands.clone(),
            ..Default::default()
        }])
    }
}


impl OptProcess for Band {
    fn process(&self) -> Result<()> {
        if self.gen_template {
            return SelectionConfig::write_template("rsfleur_selection.toml");
        }

        let settings = Settings::from_default()?;
        let opts = self.weight_options(&settings);
        let threshold = Some(self.threshold.unwrap_or(settings.weight_threshold));

        let data = BandData::from_file(&self.banddos)?;
        let raw_selections = self.raw_selections()?;
        let pair = if self.compare.is_empty() {
            None
        } else {
            Some(RawSelection::parse_character_pair(&self.compare, data.nchar)?)
        };

        let mut jobs = vec![];
        for (i, raw) in raw_selections.iter().enumerate() {
            let sel = raw.to_selection(&data)?;
            let label = raw.label_or(i);
            for ispin in selected_indices(&sel.spins) {
                let suffix = match (data.nspin, ispin) {
                    (2, 0) => format!("{}_up", label),
                    (2, _) => format!("{}_dn", label),
                    _      => label.clone(),
                };
                jobs.push((suffix, sel.with_spin(ispin)?));
            }
        }

        let single = jobs.len() == 1;
        for (suffix, sel) in jobs {
            let fname = if single { self.txtout.clone() } else { suffixed_path(&self.txtout, &suffix) };

            if let Some(pair) = pair {
                let cmp = compare_character_pair(&data, &sel, pair, &opts)?;
                let pts = cmp.to_points(&data, threshold)?;
                info!("Writing {} points of `{}` to {:?}", pts.k.len(), suffix, fname);
                write_array_to_txt(&fname, vec![&pts.k, &pts.energy, &pts.color, &pts.size],
                                   &format!("{}: k  E-Ef(eV)  color({})  size({}+{})", suffix,
                                            self.compare[0], self.compare[0], self.compare[1]))?;
            } else {
                let w = band_weights(&data, &sel, &opts)?;
                let pts = w.to_points(&data, threshold)?;
                info!("Writing {} points of `{}` to {:?}", pts.k.len(), suffix, fname);
                write_array_to_txt(&fname, vec![&pts.k, &pts.energy, &pts.weight],
                                   &format!("{}: k  E-Ef(eV)  weight", suffix))?;
            }
        }

        Ok(())
    }
}
