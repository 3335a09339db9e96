//! Integration tests for locators, raw parsing and the cache-aside loader

mod common;

use std::fs;

use tempfile::TempDir;
use wtd_tools::data::ingest::save_frame;
use wtd_tools::{CacheStore, DataSource, Ingestor, Locator, Options, WtdError};

#[test]
fn direct_file_is_parsed_as_is_without_reconstruction() {
    let dir = TempDir::new().unwrap();
    let raw = common::write_raw(dir.path());

    let locator = Locator::parse(&format!("direct-file://{}", raw.display())).unwrap();
    let mut ingestor = Ingestor::new(common::key(), Options::raw()).unwrap();
    assert_eq!(ingestor.load(&locator).unwrap(), DataSource::Raw);

    let frame = ingestor.frame().unwrap();
    assert_eq!(frame.len(), common::ROWS + 1);
    assert_eq!(frame.channels().len(), 82);
    assert_eq!(frame.channel("B9S8").unwrap()[0], 908.0);
    assert_eq!(frame.channel("Mfc1_Read").unwrap()[common::RELEASE_ROW + 1], 100.0);
}

#[test]
fn archive_entry_reads_through_the_zip() {
    let dir = TempDir::new().unwrap();
    let archive = common::write_archive(dir.path(), "CO_1000/L4_trial7.txt");

    let locator = Locator::parse(&format!(
        "archive-entry://{}/CO_1000/L4_trial7.txt",
        archive.display()
    ))
    .unwrap();
    let mut ingestor = Ingestor::new(common::key(), Options::raw()).unwrap();
    ingestor.load(&locator).unwrap();
    assert_eq!(ingestor.frame().unwrap().len(), common::ROWS + 1);

    let missing = Locator::ArchiveEntry {
        archive,
        entry: "CO_1000/L4_trial8.txt".into(),
    };
    let err = Ingestor::new(common::key(), Options::raw())
        .unwrap()
        .load(&missing)
        .unwrap_err();
    assert!(matches!(err, WtdError::NotFound(_)), "{err}");
}

#[test]
fn missing_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let locator = Locator::DirectFile(dir.path().join("absent.txt"));
    let err = Ingestor::new(common::key(), Options::raw())
        .unwrap()
        .load(&locator)
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn cache_aside_creates_the_store_then_serves_from_it() {
    let dir = TempDir::new().unwrap();
    let raw = common::write_raw(dir.path());
    let store_dir = dir.path().join("cache");
    let options = Options::raw().with_cache(&store_dir);
    let locator = Locator::DirectFile(raw.clone());

    // first load: no store yet, it gets created and the raw file is parsed
    let mut first = Ingestor::new(common::key(), options.clone()).unwrap();
    assert_eq!(first.load(&locator).unwrap(), DataSource::Raw);
    assert!(store_dir.is_dir());
    let store = CacheStore::open(&store_dir).unwrap();
    assert!(!store.contains(&common::key()));
    assert!(first.save(&store, false).unwrap());

    // second load: served from the store, the raw file is never touched
    fs::remove_file(&raw).unwrap();
    let mut second = Ingestor::new(common::key(), options).unwrap();
    assert_eq!(second.load(&locator).unwrap(), DataSource::Cache);
    assert_eq!(second.frame(), first.frame());
}

#[test]
fn cache_store_locator_has_no_fallback() {
    let dir = TempDir::new().unwrap();
    let store = CacheStore::create(dir.path().join("cache")).unwrap();
    let locator = Locator::CacheStore(store.root().to_path_buf());

    let err = Ingestor::new(common::key(), Options::raw())
        .unwrap()
        .load(&locator)
        .unwrap_err();
    assert!(matches!(err, WtdError::NotFound(_)));

    let absent = Locator::CacheStore(dir.path().join("nowhere"));
    let err = Ingestor::new(common::key(), Options::raw())
        .unwrap()
        .load(&absent)
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn ingestor_state_errors() {
    let dir = TempDir::new().unwrap();
    let raw = common::write_raw(dir.path());
    let store = CacheStore::create(dir.path().join("cache")).unwrap();

    let mut ingestor = Ingestor::new(common::key(), Options::raw()).unwrap();
    assert!(matches!(ingestor.save(&store, false), Err(WtdError::State(_))));

    ingestor.load(&Locator::DirectFile(raw.clone())).unwrap();
    let again = ingestor.load(&Locator::DirectFile(raw));
    assert!(matches!(again, Err(WtdError::State(_))));
}

#[test]
fn cache_without_location_is_a_configuration_error() {
    let options = Options {
        use_cache: true,
        ..Options::raw()
    };
    assert!(matches!(
        Ingestor::new(common::key(), options),
        Err(WtdError::Configuration(_))
    ));
}

#[test]
fn store_keys_and_copy() {
    let dir = TempDir::new().unwrap();
    let raw = common::write_raw(dir.path());
    let mut ingestor = Ingestor::new(common::key(), Options::raw()).unwrap();
    ingestor.load(&Locator::DirectFile(raw)).unwrap();
    let frame = ingestor.frame().unwrap();

    let source = CacheStore::create(dir.path().join("a")).unwrap();
    let mut other = common::key();
    other.trial = 8;
    assert!(save_frame(&source, &common::key(), frame, false).unwrap());
    assert!(save_frame(&source, &other, frame, false).unwrap());
    // an existing key is left alone without overwrite
    assert!(!save_frame(&source, &other, frame, false).unwrap());
    assert_eq!(source.keys().unwrap(), vec![common::key(), other.clone()]);

    let target = CacheStore::create(dir.path().join("b")).unwrap();
    assert_eq!(source.copy_into(&target).unwrap(), 2);
    assert_eq!(&target.get(&other).unwrap(), frame);
}
