use log::debug;

use crate::{
    fleur_ensure,
    types::{
        Result,
        Vector,
    },
    weights::{
        WeightOptions,
        group_multiplicities,
    },
    fleur_parsers::banddos::BandData,
    fleur_parsers::dostable::{
        DosTable,
        DosLayout,
        INTERSTITIAL_COLUMN,
        VACUUM_COLUMNS,
    },
    selection::selected_indices,
};


#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DosOptions {
    /// Add the interstitial column.
    pub interstitial: bool,
    /// Add both vacuum columns.
    pub vacuum: bool,
}


#[derive(Clone, Debug, PartialEq)]
pub struct DosCurve {
    pub energy: Vector<f64>,
    pub dos:    Vector<f64>,
}


/// Sum the DOS columns picked by the group and character masks.
///
/// With every character selected the per-group total column is used, otherwise the selected
/// character columns are summed. Each group contributes `multiplicities[g]` times.
pub fn project_dos(table: &DosTable,
                   layout: &DosLayout,
                   groups: &[bool],
                   characters: &[bool],
                   multiplicities: &[f64],
                   opts: &DosOptions) -> Result<DosCurve> {
    layout.check(table.ncols())?;
    fleur_ensure!(groups.len() == layout.num_groups, Selection,
        "group mask has length {}, expected {}", groups.len(), layout.num_groups);
    fleur_ensure!(characters.len() == layout.num_characters, Selection,
        "character mask has length {}, expected {}", characters.len(), layout.num_characters);
    fleur_ensure!(multiplicities.len() == layout.num_groups, Shape,
        "{} group multiplicities for {} atom groups", multiplicities.len(), layout.num_groups);

    let all_characters = characters.iter().all(|&c| c);
    let ichars = selected_indices(characters);
    let igroups = selected_indices(groups);
    debug!("Projecting DOS on groups {:?}, characters {:?}, {:?}", igroups, ichars, opts);

    let mut dos = Vector::<f64>::zeros(table.nrows());
    for &ig in igroups.iter() {
        let m = multiplicities[ig];
        if all_characters {
            dos.scaled_add(m, &table.data.column(layout.group_total_column(ig)));
        } else {
            for &ic in ichars.iter() {
                dos.scaled_add(m, &table.data.column(layout.character_column(ic, ig)));
            }
        }
    }

    if opts.interstitial {
        dos += &table.data.column(INTERSTITIAL_COLUMN);
    }
    if opts.vacuum {
        for icol in VACUUM_COLUMNS {
            dos += &table.data.column(icol);
        }
    }

    Ok(DosCurve {
        energy: table.energies(),
        dos,
    })
}


/// Group multiplicities for a DOS table taken from the band data of the same run, so both
/// projections weight the groups identically.
pub fn layout_multiplicities(data: &BandData, layout: &DosLayout, opts: &WeightOptions) -> Result<Vec<f64>> {
    fleur_ensure!(data.ngroups == layout.num_groups, Shape,
        "band data has {} atom groups but the DOS table has {}", data.ngroups, layout.num_groups);
    Ok(group_multiplicities(data, opts))
}
