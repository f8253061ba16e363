use assert_matches::assert_matches;

use nifti_organizer::error::OrganizerError;
use nifti_organizer::identifier::{ParseResult, SubjectKey, parse_raw_folder, parse_subject_folder};

#[test]
fn three_or_more_parts_take_second_and_third() {
    for (raw, subject, scan) in [
        ("R2D3_SP000_1", "SP000", "1"),
        ("R2D3_SP014_2", "SP014", "2"),
        ("WPC_SP100_3_extra", "SP100", "3"),
    ] {
        assert_eq!(
            parse_raw_folder(raw),
            ParseResult::Parsed(SubjectKey::new(subject, scan)),
            "{raw}"
        );
    }
}

#[test]
fn two_parts_default_scan_one() {
    assert_eq!(
        parse_raw_folder("R2D3_SP000"),
        ParseResult::Parsed(SubjectKey::new("SP000", "1"))
    );
}

#[test]
fn staged_folder_splits_on_last_delimiter() {
    let key = match parse_subject_folder("SP000_2") {
        ParseResult::Parsed(key) => key,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(key.subject_id(), "SP000");
    assert_eq!(key.scan_id(), "2");
}

#[test]
fn malformed_staged_folder_is_an_error_when_parsed() {
    let err = "SP000".parse::<SubjectKey>().unwrap_err();
    assert_matches!(err, OrganizerError::MalformedIdentifier(raw) if raw == "SP000");
    let err = "_1".parse::<SubjectKey>().unwrap_err();
    assert_matches!(err, OrganizerError::MalformedIdentifier(_));
}
