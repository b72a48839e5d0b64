use std::path::PathBuf;

use anyhow::ensure;
use clap::Args;
use colored::Colorize;

use crate::{
    types::Result,
    OptProcess,
    fleur_parsers::{
        banddos::BandData,
        dostable::sniff_layout,
    },
    display::DisplayValues,
};


#[derive(Debug, Args)]
/// Print what can be selected from a banddos.hdf file and/or a DOS table.
pub struct Info {
    #[arg(short = 'b', long)]
    /// banddos.hdf file name.
    banddos: Option<PathBuf>,

    #[arg(short = 'd', long)]
    /// DOS table file name.
    dos: Option<PathBuf>,

    #[arg(long, default_value_t = 4)]
    /// Number of orbital characters per group in the DOS table.
    num_characters: usize,
}


impl OptProcess for Info {
    fn process(&self) -> Result<()> {
        ensure!(self.banddos.is_some() || self.dos.is_some(),
            "At least one of `--banddos` and `--dos` should be provided.");

        let data = self.banddos.as_ref()
            .map(|p| BandData::from_file(p))
            .transpose()?;
        let layout = self.dos.as_ref()
            .map(|p| sniff_layout(p, self.num_characters))
            .transpose()?;

        let dv = DisplayValues::new(data.as_ref(), layout.as_ref())?;

        let mut output = String::with_capacity(512);
        output.push_str("--------------------------------------------------------------------------------\n");
        if let Some(data) = data.as_ref() {
            output.push_str(&format!(" {:<24}{}  spin(s), {} k-points, {} bands, {} atom groups\n",
                                     "banddos:".bright_green(), data.nspin, data.nkpoints, data.nbands, data.ngroups));
            output.push_str(&format!(" {:<24}{:.6} Ha\n", "Fermi energy:".bright_green(), data.fermi_energy));
            output.push_str(&format!(" {:<24}{}\n", "band unfolding:".bright_green(), data.band_unfolding));
        }
        if let Some(layout) = layout.as_ref() {
            output.push_str(&format!(" {:<24}{} atom groups, {} characters, {} columns\n",
                                     "DOS table:".bright_green(), layout.num_groups, layout.num_characters,
                                     layout.expected_columns()));
        }
        output.push_str("--------------------------------------------------------------------------------\n");
        output.push_str(&dv.to_string());
        output.push_str("--------------------------------------------------------------------------------");
        println!("{}", output);

        Ok(())
    }
}
