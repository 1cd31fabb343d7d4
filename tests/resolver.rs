//! Resolver caching and reference counting.

mod common;

use std::io::SeekFrom;

use common::{context, test_data, write_file};
use stackvfs::{Context, Error, PathSpec, Resolver};
use tempfile::TempDir;

#[test]
fn test_equal_specs_share_one_stream() {
    let dir = TempDir::new().unwrap();
    let spec = write_file(dir.path(), "image.raw", &test_data(4096));
    let same = PathSpec::os(spec.location().unwrap()).unwrap();
    let context = context();

    let first = Resolver::open_file_object(&spec, &context).unwrap();
    let second = Resolver::open_file_object(&same, &context).unwrap();

    assert!(first.is_same_resource(&second));
    assert_eq!(context.file_object_reference_count(&spec), 2);
    assert_eq!(context.number_of_file_objects(), 1);
}

#[test]
fn test_last_release_closes_and_evicts() {
    let dir = TempDir::new().unwrap();
    let spec = write_file(dir.path(), "image.raw", &test_data(64));
    let context = context();

    let mut first = Resolver::open_file_object(&spec, &context).unwrap();
    let second = Resolver::open_file_object(&spec, &context).unwrap();

    first.close().unwrap();
    assert_eq!(context.file_object_reference_count(&spec), 1);
    assert!(second.is_open());
    assert_eq!(second.read(4).unwrap(), test_data(4));

    drop(second);
    assert_eq!(context.file_object_reference_count(&spec), 0);
    assert_eq!(context.number_of_file_objects(), 0);
}

#[test]
fn test_close_twice_releases_once() {
    let dir = TempDir::new().unwrap();
    let spec = write_file(dir.path(), "image.raw", &test_data(64));
    let context = context();

    let mut first = Resolver::open_file_object(&spec, &context).unwrap();
    let _second = Resolver::open_file_object(&spec, &context).unwrap();

    first.close().unwrap();
    first.close().unwrap();
    assert_eq!(context.file_object_reference_count(&spec), 1);
    assert!(matches!(first.read(1), Err(Error::NotOpen)));
}

#[test]
fn test_reopen_after_release_builds_new_instance() {
    let dir = TempDir::new().unwrap();
    let spec = write_file(dir.path(), "image.raw", &test_data(64));
    let context = context();

    let first = Resolver::open_file_object(&spec, &context).unwrap();
    first.seek(SeekFrom::Start(10)).unwrap();
    drop(first);

    let second = Resolver::open_file_object(&spec, &context).unwrap();
    assert_eq!(second.offset().unwrap(), 0);
    assert_eq!(context.file_object_reference_count(&spec), 1);
}

#[test]
fn test_contexts_are_independent() {
    let dir = TempDir::new().unwrap();
    let spec = write_file(dir.path(), "image.raw", &test_data(64));
    let one = context();
    let two = Context::new();

    let a = Resolver::open_file_object(&spec, &one).unwrap();
    let b = Resolver::open_file_object(&spec, &two).unwrap();

    assert!(!a.is_same_resource(&b));
    assert_eq!(one.file_object_reference_count(&spec), 1);
    assert_eq!(two.file_object_reference_count(&spec), 1);
}

#[test]
fn test_data_range_shares_parent() {
    let dir = TempDir::new().unwrap();
    let data = test_data(1024);
    let image = write_file(dir.path(), "image.raw", &data);
    let context = context();

    let low = PathSpec::data_range(0, 512, image.clone()).unwrap();
    let high = PathSpec::data_range(512, 512, image.clone()).unwrap();

    let low_stream = Resolver::open_file_object(&low, &context).unwrap();
    let high_stream = Resolver::open_file_object(&high, &context).unwrap();

    assert_eq!(context.file_object_reference_count(&image), 2);
    assert_eq!(context.number_of_file_objects(), 3);

    assert_eq!(low_stream.size().unwrap(), 512);
    assert_eq!(high_stream.read(8).unwrap(), data[512..520]);
    assert_eq!(low_stream.read(8).unwrap(), data[..8]);

    drop(low_stream);
    drop(high_stream);
    assert_eq!(context.number_of_file_objects(), 0);
}

#[test]
fn test_data_range_past_parent_end_is_truncated() {
    let dir = TempDir::new().unwrap();
    let data = test_data(100);
    let image = write_file(dir.path(), "image.raw", &data);
    let context = context();

    let spec = PathSpec::data_range(90, 50, image).unwrap();
    let stream = Resolver::open_file_object(&spec, &context).unwrap();
    assert_eq!(stream.read_all().unwrap(), data[90..]);
}

#[test]
fn test_empty_closes_outstanding_handles() {
    let dir = TempDir::new().unwrap();
    let spec = write_file(dir.path(), "image.raw", &test_data(64));
    let context = context();

    let stream = Resolver::open_file_object(&spec, &context).unwrap();
    context.empty();

    assert_eq!(context.number_of_file_objects(), 0);
    assert!(!stream.is_open());
    drop(stream);
    assert_eq!(context.file_object_reference_count(&spec), 0);
}

#[test]
fn test_handle_from_before_empty_leaves_new_stream_open() {
    let dir = TempDir::new().unwrap();
    let data = test_data(64);
    let spec = write_file(dir.path(), "image.raw", &data);
    let context = context();

    let stale = Resolver::open_file_object(&spec, &context).unwrap();
    context.empty();

    let fresh = Resolver::open_file_object(&spec, &context).unwrap();
    assert!(!fresh.is_same_resource(&stale));
    assert_eq!(context.file_object_reference_count(&spec), 1);

    drop(stale);
    assert_eq!(context.file_object_reference_count(&spec), 1);
    assert!(fresh.is_open());
    assert_eq!(fresh.read_all().unwrap(), data);

    drop(fresh);
    assert_eq!(context.number_of_file_objects(), 0);
}

#[test]
fn test_file_system_from_before_empty_leaves_new_one_open() {
    let dir = TempDir::new().unwrap();
    let spec = write_file(dir.path(), "image.raw", &test_data(16));
    let context = context();

    let stale = Resolver::open_file_system(&spec, &context).unwrap();
    context.empty();
    let fresh = Resolver::open_file_system(&spec, &context).unwrap();

    drop(stale);
    assert_eq!(context.file_system_reference_count(&spec), 1);
    assert!(fresh.is_open());
    assert!(fresh.file_entry_exists_by_path_spec(&spec));
}

#[test]
fn test_failed_open_is_not_cached() {
    let dir = TempDir::new().unwrap();
    let missing = PathSpec::os(dir.path().join("missing.raw").to_string_lossy()).unwrap();
    let context = context();

    assert!(Resolver::open_file_object(&missing, &context).is_err());
    assert_eq!(context.number_of_file_objects(), 0);
    assert_eq!(context.file_object_reference_count(&missing), 0);
}

#[test]
fn test_os_directory_is_not_a_stream() {
    let dir = TempDir::new().unwrap();
    let spec = PathSpec::os(dir.path().to_string_lossy()).unwrap();
    let result = Resolver::open_file_object(&spec, &context());
    assert!(matches!(result, Err(Error::PathSpec(_))));
}

#[test]
fn test_seek_before_start_is_rejected() {
    let dir = TempDir::new().unwrap();
    let spec = write_file(dir.path(), "image.raw", &test_data(64));
    let context = context();
    let stream = Resolver::open_file_object(&spec, &context).unwrap();

    assert!(matches!(
        stream.seek(SeekFrom::Current(-1)),
        Err(Error::InvalidOffset { .. })
    ));
    assert_eq!(stream.seek(SeekFrom::End(-4)).unwrap(), 60);
    assert_eq!(stream.seek(SeekFrom::Start(1000)).unwrap(), 1000);
    assert!(stream.read(16).unwrap().is_empty());
}

#[test]
fn test_os_file_system_lists_directory() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "one.raw", b"1");
    write_file(dir.path(), "two.raw", b"22");
    let context = context();

    let spec = PathSpec::os(dir.path().to_string_lossy()).unwrap();
    let entry = Resolver::open_file_entry(&spec, &context).unwrap().unwrap();
    assert!(entry.is_directory());

    let mut names: Vec<String> = entry
        .sub_file_entries()
        .unwrap()
        .map(|child| child.unwrap().name().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["one.raw", "two.raw"]);

    let two = PathSpec::os(dir.path().join("two.raw").to_string_lossy()).unwrap();
    let two = Resolver::open_file_entry(&two, &context).unwrap().unwrap();
    assert!(two.is_file());
    assert_eq!(two.stat().unwrap().size, Some(2));
    assert_eq!(two.get_file_object().unwrap().unwrap().read_all().unwrap(), b"22");
}

#[test]
fn test_os_missing_entry_is_none() {
    let dir = TempDir::new().unwrap();
    let spec = PathSpec::os(dir.path().join("nothing").to_string_lossy()).unwrap();
    assert!(Resolver::open_file_entry(&spec, &context()).unwrap().is_none());
}
