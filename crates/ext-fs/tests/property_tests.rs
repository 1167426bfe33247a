use ext_fs::NormalizedPath;
use proptest::prelude::*;

proptest! {
    #[test]
    fn normalized_paths_never_contain_backslashes(s in "\\PC*") {
        let path = NormalizedPath::new(&s);
        prop_assert!(!path.as_str().contains('\\'));
    }

    #[test]
    fn normalization_is_idempotent(s in "\\PC*") {
        let once = NormalizedPath::new(&s);
        let twice = NormalizedPath::new(once.as_str());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn joined_path_starts_with_base(base in "/[a-z]{1,8}(/[a-z]{1,8}){0,3}", seg in "[a-z]{1,8}(/[a-z]{1,8}){0,2}\\.php") {
        let joined = NormalizedPath::new(&base).join(&seg);
        prop_assert!(joined.as_str().starts_with(&base));
        prop_assert!(joined.as_str().ends_with(&seg));
        prop_assert!(joined.is_absolute());
    }
}
