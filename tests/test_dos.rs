use std::fs;

use approx::assert_relative_eq;
use ndarray::arr1;
use tempdir::TempDir;

use rsfleur::{
    DosTable,
    DosLayout,
    DosOptions,
    DisplayValues,
    FleurError,
    project_dos,
    fleur_parsers::dostable::sniff_layout,
    commands::common::{
        write_array_to_txt,
        RawSelection,
        SelectionConfig,
    },
    selection::{
        group_mask,
        character_mask,
    },
};


const DOS_1: &str = "\
-1.0  3.0  0.5  0.0  0.0  1.25  1.25  0.5  0.25  0.5  0.5  0.25  0.25  0.0  0.25
-0.5  2.0  0.2  0.1  0.1  0.80  0.80  0.2  0.2   0.3  0.3  0.2   0.2   0.1  0.1
 0.0  1.0  0.1  0.05 0.05 0.40  0.40  0.1  0.1   0.1  0.1  0.1   0.1   0.1  0.1
";


fn write_dos(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("DOS.1");
    fs::write(&path, DOS_1).unwrap();
    path
}


#[test]
fn test_project_single_character() {
    let dir = TempDir::new("rsfleur_dos").unwrap();
    let table = DosTable::from_file(&write_dos(&dir)).unwrap();
    let layout = table.layout(4).unwrap();
    assert_eq!(layout, DosLayout::new(2, 4));

    let (m1, m2) = (2.0, 1.0);
    let curve = project_dos(&table, &layout,
                            &group_mask(None, 2).unwrap(),
                            &character_mask(Some(&[0]), 4).unwrap(),
                            &[m1, m2], &DosOptions::default()).unwrap();
    assert_eq!(curve.energy, arr1(&[-1.0, -0.5, 0.0]));
    assert_relative_eq!(curve.dos[0], m1 * 0.5 + m2 * 0.25, epsilon = 1E-12);
}


#[test]
fn test_total_round_trip() {
    let dir = TempDir::new("rsfleur_dos").unwrap();
    let table = DosTable::from_file(&write_dos(&dir)).unwrap();
    let layout = table.layout(4).unwrap();

    let opts = DosOptions { interstitial: true, vacuum: true };
    let curve = project_dos(&table, &layout, &[true; 2], &[true; 4], &[1.0; 2], &opts).unwrap();
    assert_relative_eq!(curve.dos, table.total(), epsilon = 1E-9);

    let without_vacuum = project_dos(&table, &layout, &[true; 2], &[true; 4], &[1.0; 2],
                                     &DosOptions { interstitial: true, vacuum: false }).unwrap();
    assert_relative_eq!(without_vacuum.dos[1], 2.0 - 0.2, epsilon = 1E-9);
}


#[test]
fn test_layout_mismatch() {
    let dir = TempDir::new("rsfleur_dos").unwrap();
    let path = write_dos(&dir);

    assert_eq!(sniff_layout(&path, 4).unwrap(), DosLayout::new(2, 4));
    let err = sniff_layout(&path, 3).unwrap_err();
    assert!(matches!(err.downcast_ref::<FleurError>(), Some(FleurError::Format(_))));

    let err = DosTable::from_file(&dir.path().join("DOS.2")).unwrap_err();
    assert!(matches!(err.downcast_ref::<FleurError>(), Some(FleurError::Io(_))));
}


#[test]
fn test_display_from_dos() {
    let dir = TempDir::new("rsfleur_dos").unwrap();
    let layout = sniff_layout(&write_dos(&dir), 4).unwrap();
    let dv = DisplayValues::new(None, Some(&layout)).unwrap();

    let masks = dv.convert_selections(&["d"], &["2"], &[]).unwrap();
    assert_eq!(masks.characters, vec![false, false, true, false]);
    assert_eq!(masks.groups, vec![false, true]);
}


#[test]
fn test_selection_file_and_output() {
    let dir = TempDir::new("rsfleur_dos").unwrap();
    let cfg_path = dir.path().join("selection.toml");
    fs::write(&cfg_path, r#"
[[selection]]
label = "grp2_p"
groups = "-1"
characters = "p"
factor = 2.0
"#).unwrap();

    let cfg = SelectionConfig::from_file(&cfg_path).unwrap();
    let raw: &RawSelection = &cfg.selection[0];
    assert_eq!(RawSelection::parse_igroups(raw.groups.as_deref(), 2).unwrap(), vec![1]);
    assert_eq!(RawSelection::parse_icharacters(raw.characters.as_deref(), 4).unwrap(), vec![1]);
    assert_eq!(raw.label_or(0), "grp2_p");
    assert_eq!(raw.factor(), 2.0);

    let out = dir.path().join("dos.txt");
    let e = arr1(&[-1.0, 0.0]);
    let d = arr1(&[0.5, 0.25]);
    write_array_to_txt(&out, vec![&e, &d], "E  grp2_p").unwrap();

    let txt = fs::read_to_string(&out).unwrap();
    let lines = txt.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "# E  grp2_p");
    let row = lines[2].split_whitespace()
        .map(|x| x.parse::<f64>().unwrap())
        .collect::<Vec<_>>();
    assert_eq!(row, vec![0.0, 0.25]);
}
