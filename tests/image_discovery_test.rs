// tests/image_discovery_test.rs
use doc_build::config::Config;
use doc_build::images::{converted_path, discover_images, ImageFilter};
use std::fs;
use std::path::{Path, PathBuf};

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"<svg/>").unwrap();
}

fn default_filter() -> ImageFilter {
    let config = Config::default();
    ImageFilter::new(&config.images.name_filter, &config.images.recurse_filter).unwrap()
}

#[test]
fn test_discovery_follows_name_filters() {
    let dir = tempfile::tempdir().unwrap();
    let g = dir.path().join("g");
    touch(&g.join("foo.svg"));
    touch(&g.join("nested/deeper/baz.svg"));
    touch(&g.join("sub.dir/bar.svg"));
    touch(&g.join("a.b.svg"));
    touch(&g.join("notes.txt"));
    touch(&g.join("foo.svg.bak"));
    touch(&g.join(".hidden/x.svg"));

    let images = discover_images(&g, &default_filter()).unwrap();
    assert_eq!(
        images,
        vec![
            PathBuf::from("foo.svg"),
            PathBuf::from("nested/deeper/baz.svg"),
        ]
    );
}

#[test]
fn test_directory_named_like_image_is_not_converted() {
    let dir = tempfile::tempdir().unwrap();
    let g = dir.path().join("g");
    fs::create_dir_all(g.join("looks.svg")).unwrap();
    touch(&g.join("real.svg"));

    let images = discover_images(&g, &default_filter()).unwrap();
    assert_eq!(images, vec![PathBuf::from("real.svg")]);
}

#[test]
fn test_missing_image_directory_yields_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let images = discover_images(&dir.path().join("g"), &default_filter()).unwrap();
    assert!(images.is_empty());
}

#[test]
fn test_filters_match_whole_names() {
    let filter = ImageFilter::new("[a-z]+\\.svg", "[a-z]+").unwrap();
    assert!(filter.matches_file("plot.svg"));
    assert!(!filter.matches_file("plot.svgz"));
    assert!(!filter.matches_file("xplot.svg.orig"));
    assert!(filter.matches_dir("figures"));
    assert!(!filter.matches_dir("figures2"));
}

#[test]
fn test_invalid_filter_rejected() {
    assert!(ImageFilter::new("[", "[^.]+").is_err());
    assert!(ImageFilter::new("[^.]+\\.svg", "(").is_err());
}

#[test]
fn test_converted_path_mirrors_source_tree() {
    let out = Path::new("/p/build/out/generated/g");
    assert_eq!(
        converted_path(out, Path::new("nested/baz.svg")),
        PathBuf::from("/p/build/out/generated/g/nested/baz.pdf")
    );
}
