use nifti_organizer::matcher::{EMPTY, match_scans};
use nifti_organizer::rules::{Rule, RuleTable};

const FILES: [&str; 2] = ["sub01_T1w.raw", "sub01_T2w.raw"];

#[test]
fn identifier_selects_single_candidate() {
    let rules = vec![Rule::new("T1", Some(""), "anat", "T1.img")];
    let matches = match_scans(&FILES, &rules);
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].rule.identifier, "T1");
    assert_eq!(matches[0].selected.as_deref(), Some("sub01_T1w.raw"));
}

#[test]
fn excluded_only_candidate_yields_empty() {
    let rules = vec![Rule::new("T1", Some("T1w"), "anat", "T1.img")];
    let matches = match_scans(&FILES, &rules);
    assert_eq!(matches[0].selected, None);
    assert_eq!(matches[0].to_string(), format!("T1 -> {EMPTY}"));
}

#[test]
fn no_identifier_hit_yields_empty() {
    let rules = vec![Rule::new("DTI", None, "dwi", "dwi.nii")];
    assert!(match_scans(&FILES, &rules)[0].is_empty());
}

#[test]
fn excluded_file_never_selected_even_if_first() {
    let files = ["a_DTI_ADC.nii", "b_DTI.nii", "c_DTI_FA.nii"];
    let rules = vec![Rule::new("DTI", Some("ADC"), "dwi", "dwi.nii")];
    let matches = match_scans(&files, &rules);
    assert_eq!(matches[0].selected.as_deref(), Some("b_DTI.nii"));
}

#[test]
fn selection_independent_of_listing_order() {
    let rules = vec![Rule::new("T1", None, "anat", "T1.nii")];
    let forward = match_scans(&["T1_b.nii", "T1_a.nii"], &rules);
    let backward = match_scans(&["T1_a.nii", "T1_b.nii"], &rules);
    assert_eq!(forward[0].selected, backward[0].selected);
    assert_eq!(forward[0].selected.as_deref(), Some("T1_a.nii"));
}

#[test]
fn result_follows_rule_order() {
    let table = RuleTable::from_csv(
        "folder,name,identifier,exclude,path\n\
         func,rest.nii,REST,,\n\
         anat,T1.nii,T1,,\n\
         anat2,T2.nii,T2,,\n",
    )
    .unwrap();
    let matches = match_scans(&FILES, table.rules());
    let folders = matches
        .iter()
        .map(|m| m.rule.folder.as_str())
        .collect::<Vec<_>>();
    assert_eq!(folders, vec!["func", "anat", "anat2"]);
    assert_eq!(matches[0].selected, None);
    assert_eq!(matches[1].selected.as_deref(), Some("sub01_T1w.raw"));
    assert_eq!(matches[2].selected.as_deref(), Some("sub01_T2w.raw"));
}
