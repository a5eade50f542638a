use std::io::{Cursor, Write};
use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use uis_reader::archive::{ArchiveSource, ZipFolder};
use uis_reader::cache::DataCache;
use uis_reader::catalog::{Catalog, DatasetDescriptor};
use uis_reader::error::UisError;
use uis_reader::reader::Uis;
use uis_reader::table::Value;

fn zip_bytes(members: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in members {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn edu_archive() -> Vec<u8> {
    zip_bytes(&[
        (
            "EDU_DATA_NATIONAL.csv",
            "COUNTRY_ID,INDICATOR_ID,YEAR,VALUE\nFRA,IND1,2020,5\nZWE,IND1,2020,3\n",
        ),
        ("EDU_LABEL.csv", "INDICATOR_ID,INDICATOR_LABEL_EN\nIND1,Literacy\n"),
        (
            "EDU_COUNTRY.csv",
            "COUNTRY_ID,COUNTRY_NAME_EN\nFRA,France\nZWE,Zimbabwe\n",
        ),
        (
            "EDU_METADATA.csv",
            "COUNTRY_ID,INDICATOR_ID,YEAR,TYPE,METADATA\nFRA,IND1,2020,NOTE,est.\nFRA,IND1,2020,NOTE,revised\n",
        ),
        (
            "EDU_REGION.csv",
            "REGION_ID,COUNTRY_ID\nSDG: Sub-Saharan Africa,ZWE\n",
        ),
        (
            "EDU_DATA_REGIONAL.csv",
            "REGION_ID,INDICATOR_ID,YEAR,VALUE\nSDG: Sub-Saharan Africa,IND1,2020,3\n",
        ),
    ])
}

fn minimal_archive() -> Vec<u8> {
    zip_bytes(&[
        (
            "EDU_DATA_NATIONAL.csv",
            "COUNTRY_ID,INDICATOR_ID,YEAR,VALUE\nFRA,IND1,2020,5\n",
        ),
        ("EDU_LABEL.csv", "INDICATOR_ID,INDICATOR_LABEL_EN\nIND1,Literacy\n"),
        ("EDU_COUNTRY.csv", "COUNTRY_ID,COUNTRY_NAME_EN\nFRA,France\n"),
    ])
}

/// Serves a fixed sequence of archive payloads and counts fetches.
struct ScriptedSource {
    payloads: Mutex<Vec<Result<Vec<u8>, UisError>>>,
    fetches: Mutex<usize>,
}

impl ScriptedSource {
    fn new(payloads: Vec<Result<Vec<u8>, UisError>>) -> Self {
        let mut payloads = payloads;
        payloads.reverse();
        Self {
            payloads: Mutex::new(payloads),
            fetches: Mutex::new(0),
        }
    }

    fn repeating(bytes: Vec<u8>) -> Self {
        Self::new(vec![Ok(bytes.clone()), Ok(bytes.clone()), Ok(bytes)])
    }

    fn fetches(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

impl ArchiveSource for ScriptedSource {
    fn fetch(&self, _location: &str) -> Result<ZipFolder, UisError> {
        *self.fetches.lock().unwrap() += 1;
        let payload = self
            .payloads
            .lock()
            .unwrap()
            .pop()
            .expect("no payload scripted");
        ZipFolder::from_bytes(payload?)
    }
}

fn catalog() -> Catalog {
    Catalog::from_descriptors(vec![DatasetDescriptor {
        name: "Education".to_string(),
        code: "EDU".to_string(),
        category: "Education".to_string(),
        url: "https://x/EDU.zip".to_string(),
        regional: true,
    }])
    .unwrap()
}

fn reader_over(source: Arc<ScriptedSource>) -> (Uis, Arc<DataCache>) {
    let cache = Arc::new(DataCache::new(source));
    let uis = Uis::new(&catalog(), Arc::clone(&cache), "Education").unwrap();
    (uis, cache)
}

#[test]
fn merged_row_carries_labels_and_squashed_metadata() {
    let source = Arc::new(ScriptedSource::repeating(edu_archive()));
    let (uis, _cache) = reader_over(Arc::clone(&source));

    // no I/O before the first data access
    assert_eq!(source.fetches(), 0);

    let table = uis.country_data(true, None).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table.value(0, "country_id"), Some(&Value::Text("FRA".to_string())));
    assert_eq!(table.value(0, "country_name"), Some(&Value::Text("France".to_string())));
    assert_eq!(table.value(0, "indicator_label"), Some(&Value::Text("Literacy".to_string())));
    assert_eq!(table.value(0, "year"), Some(&Value::Number(2020.0)));
    assert_eq!(table.value(0, "value"), Some(&Value::Number(5.0)));
    assert_eq!(table.value(0, "NOTE"), Some(&Value::Text("est. / revised".to_string())));
    assert_eq!(table.value(1, "NOTE"), Some(&Value::Null));
}

#[test]
fn default_projection_drops_metadata_columns() {
    let source = Arc::new(ScriptedSource::repeating(edu_archive()));
    let (uis, _cache) = reader_over(source);

    let table = uis.country_data(false, None).unwrap();
    assert_eq!(
        table.columns(),
        [
            "country_id",
            "country_name",
            "indicator_id",
            "indicator_label",
            "year",
            "value"
        ]
    );
}

#[test]
fn region_filter_keeps_member_countries_only() {
    let source = Arc::new(ScriptedSource::repeating(edu_archive()));
    let (uis, _cache) = reader_over(source);

    let table = uis
        .country_data(false, Some("SDG: Sub-Saharan Africa"))
        .unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.value(0, "country_id"), Some(&Value::Text("ZWE".to_string())));
}

#[test]
fn unknown_region_is_an_error_not_an_empty_result() {
    let source = Arc::new(ScriptedSource::repeating(edu_archive()));
    let (uis, _cache) = reader_over(source);

    let err = uis
        .country_data(false, Some("WB: East Asia"))
        .unwrap_err();
    assert_matches!(err, UisError::RegionNotFound(_));
}

#[test]
fn datasets_without_regional_members_are_unsupported() {
    let source = Arc::new(ScriptedSource::repeating(minimal_archive()));
    let (uis, _cache) = reader_over(source);

    assert_matches!(uis.region_data(false).unwrap_err(), UisError::Unsupported(_));
    assert_matches!(uis.regions().unwrap_err(), UisError::Unsupported(_));
    assert_matches!(uis.metadata().unwrap_err(), UisError::Unsupported(_));
    assert_matches!(uis.readme().unwrap_err(), UisError::Unsupported(_));
    assert_matches!(
        uis.country_data(false, Some("SDG: Sub-Saharan Africa"))
            .unwrap_err(),
        UisError::Unsupported(_)
    );
    // countries concordance is present in the minimal archive
    assert_eq!(uis.countries().unwrap().len(), 1);
}

#[test]
fn unknown_dataset_name_lists_alternatives() {
    let err = Uis::new(
        &catalog(),
        Arc::new(DataCache::new(Arc::new(ScriptedSource::new(Vec::new())))),
        "Basket Weaving",
    )
    .unwrap_err();
    assert_matches!(err, UisError::DatasetNotFound { ref available, .. } if available.contains("Education"));
}

#[test]
fn accesses_reuse_the_cached_dataset() {
    let source = Arc::new(ScriptedSource::repeating(edu_archive()));
    let (uis, _cache) = reader_over(Arc::clone(&source));

    uis.country_data(false, None).unwrap();
    uis.region_data(false).unwrap();
    uis.metadata().unwrap();
    assert_eq!(source.fetches(), 1);

    uis.refresh().unwrap();
    assert_eq!(source.fetches(), 2);
    uis.country_data(false, None).unwrap();
    assert_eq!(source.fetches(), 2);
}

#[test]
fn refresh_on_one_reader_is_visible_to_another() {
    let source = Arc::new(ScriptedSource::new(vec![
        Ok(minimal_archive()),
        Ok(edu_archive()),
    ]));
    let cache = Arc::new(DataCache::new(Arc::clone(&source)));
    let first = Uis::new(&catalog(), Arc::clone(&cache), "EDU").unwrap();
    let second = Uis::new(&catalog(), Arc::clone(&cache), "Education").unwrap();

    // first load binds the minimal archive, so no regional view exists
    assert_matches!(first.region_data(false).unwrap_err(), UisError::Unsupported(_));
    assert_matches!(second.region_data(false).unwrap_err(), UisError::Unsupported(_));

    // a refresh through one reader swaps the shared entry for both
    first.refresh().unwrap();
    assert_eq!(second.region_data(false).unwrap().len(), 1);
    assert_eq!(source.fetches(), 2);
}

#[test]
fn failed_refresh_retains_previous_data() {
    let source = Arc::new(ScriptedSource::new(vec![
        Ok(edu_archive()),
        Err(UisError::Transfer("connection refused".to_string())),
    ]));
    let (uis, _cache) = reader_over(Arc::clone(&source));

    let before = uis.country_data(false, None).unwrap();
    assert_matches!(uis.refresh().unwrap_err(), UisError::Transfer(_));

    let after = uis.country_data(false, None).unwrap();
    assert_eq!(before, after);
    assert_eq!(source.fetches(), 2);
}

#[test]
fn failed_initial_load_can_be_retried() {
    let source = Arc::new(ScriptedSource::new(vec![
        Err(UisError::TransferStatus {
            status: 503,
            message: "unavailable".to_string(),
        }),
        Ok(edu_archive()),
    ]));
    let (uis, _cache) = reader_over(Arc::clone(&source));

    assert_matches!(
        uis.country_data(false, None).unwrap_err(),
        UisError::TransferStatus { status: 503, .. }
    );
    // the failure is not cached, the next access retries the fetch
    assert_eq!(uis.country_data(false, None).unwrap().len(), 2);
    assert_eq!(source.fetches(), 2);
}
