use proptest::prelude::*;
use ww_lang::anchor::Path;
use ww_lang::parser;
use ww_lang::Value;

fn arb_segment() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_.-]{1,8}"
}

fn arb_path() -> impl Strategy<Value = Path> {
    prop::collection::vec(arb_segment(), 0..6).prop_map(|segments| Path::new(segments).unwrap())
}

proptest! {
    #[test]
    fn display_then_parse_round_trips(path in arb_path()) {
        let text = path.to_string();
        prop_assert_eq!(Path::parse(&text).unwrap(), path);
    }

    #[test]
    fn reader_round_trips_path_literals(path in arb_path()) {
        let form = parser::parse_one(&path.to_string()).unwrap();
        prop_assert_eq!(form, Value::Path(path));
    }

    #[test]
    fn join_is_associative(a in arb_path(), b in arb_path(), c in arb_path()) {
        prop_assert_eq!(a.join(&b).join(&c), a.join(&b.join(&c)));
    }

    #[test]
    fn segments_with_separator_are_rejected(left in arb_segment(), right in arb_segment()) {
        let joined = format!("{}/{}", left, right);
        prop_assert!(Path::new([joined]).is_err());
    }
}
