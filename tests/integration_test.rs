//! End-to-end runs against real NetCDF ensemble members

use chrono::{Duration, NaiveDateTime};
use futures::StreamExt;
use ndarray::{Array1, Array2, Array3, Array4};
use netcdf::create;
use ru_ens::data_source::{EnsembleProcessor, ProcessRequest, VersionedStore};
use ru_ens::ensemble_io::{discover_members, member_dir, read_field};
use ru_ens::errors::RuEnsError;
use ru_ens::orchestrator::{Orchestrator, RunOutcome, RunPlan};
use ru_ens::plot::SvgHovmollerRenderer;
use ru_ens::processor::NetcdfEnsembleProcessor;
use ru_ens::store::LocalRepository;
use ru_ens::time_window::{parse_timestamp, TimeWindow};
use ru_ens::variables::{VariableKind, VariableSelection};
use std::collections::BTreeSet;
use std::path::Path;
use tempfile::tempdir;

const LEV: usize = 2;
const LAT: usize = 3;
const LON: usize = 4;
const FILL: f32 = -999.0;

fn t(s: &str) -> NaiveDateTime {
    parse_timestamp(s).unwrap()
}

/// Member `m`: u = 2m + 1 + 10·lev everywhere; ps = 1000 + 2m, with a fill
/// value at lon 0 in member 1.
fn write_member(data_root: &Path, time: NaiveDateTime, member: usize) {
    let dir = member_dir(data_root, time);
    std::fs::create_dir_all(&dir).expect("Failed to create member dir");
    let path = dir.join(format!("mem{:03}.nc4", member + 1));

    let mut file = create(&path).expect("Failed to create NetCDF file");
    file.add_dimension("time", 1).unwrap();
    file.add_dimension("lev", LEV).unwrap();
    file.add_dimension("lat", LAT).unwrap();
    file.add_dimension("lon", LON).unwrap();

    {
        let mut lat = file.add_variable::<f32>("lat", &["lat"]).unwrap();
        lat.put_attribute("units", "degrees_north").unwrap();
        let values = Array1::from(vec![-60.0_f32, 0.0, 60.0]);
        lat.put(values.view(), ..).unwrap();
    }

    {
        let mut u = file
            .add_variable::<f32>("u", &["time", "lev", "lat", "lon"])
            .unwrap();
        u.put_attribute("units", "m s-1").unwrap();
        let values = Array4::from_shape_fn((1, LEV, LAT, LON), |(_, lev, _, _)| {
            (2 * member + 1) as f32 + 10.0 * lev as f32
        });
        u.put(values.view(), ..).unwrap();
    }

    {
        let mut ps = file
            .add_variable::<f32>("ps", &["time", "lat", "lon"])
            .unwrap();
        ps.put_attribute("units", "hPa").unwrap();
        ps.put_attribute("_FillValue", FILL).unwrap();
        let values = Array3::from_shape_fn((1, LAT, LON), |(_, _, lon)| {
            if member == 1 && lon == 0 {
                FILL
            } else {
                1000.0 + 2.0 * member as f32
            }
        });
        ps.put(values.view(), ..).unwrap();
    }
}

fn write_ensemble(data_root: &Path, time: NaiveDateTime) {
    for member in 0..2 {
        write_member(data_root, time, member);
    }
}

fn reference_plan() -> RunPlan {
    let window = TimeWindow::new(t("2010-01-04T00"), t("2010-01-05T00")).unwrap();
    let variables = VariableSelection::new(["u"], ["ps"]).unwrap();
    RunPlan::new(window, variables, 2).with_step(Duration::hours(6))
}

#[test]
fn member_fields_are_squeezed_and_masked() {
    let dir = tempdir().unwrap();
    write_ensemble(dir.path(), t("2010-01-04T00"));

    let members = discover_members(dir.path(), t("2010-01-04T00")).unwrap();
    assert_eq!(members.len(), 2);
    assert!(members[0].ends_with("mem001.nc4"));

    let u = read_field(&members[0], "u", VariableKind::ThreeD).unwrap();
    assert_eq!(u.shape(), &[LEV, LAT, LON]);
    assert_eq!(u[[1, 0, 0]], 11.0);

    let ps = read_field(&members[1], "ps", VariableKind::TwoD).unwrap();
    assert_eq!(ps.shape(), &[LAT, LON]);
    assert!(ps[[0, 0]].is_nan());
    assert_eq!(ps[[0, 1]], 1002.0);

    assert!(matches!(
        read_field(&members[0], "ps", VariableKind::ThreeD),
        Err(RuEnsError::ShapeMismatch { .. })
    ));
    assert!(matches!(
        read_field(&members[0], "qv", VariableKind::ThreeD),
        Err(RuEnsError::VariableNotFound { .. })
    ));
}

#[test]
fn integer_fill_value_is_masked() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mem001.nc4");
    {
        let mut file = create(&path).unwrap();
        file.add_dimension("lat", LAT).unwrap();
        file.add_dimension("lon", LON).unwrap();
        let mut counts = file.add_variable::<i32>("counts", &["lat", "lon"]).unwrap();
        counts.put_attribute("_FillValue", -999_i32).unwrap();
        let values = Array2::from_shape_fn((LAT, LON), |(lat, lon)| {
            if lat == 1 && lon == 2 {
                -999
            } else {
                (lat * LON + lon) as i32
            }
        });
        counts.put(values.view(), ..).unwrap();
    }

    let field = read_field(&path, "counts", VariableKind::TwoD).unwrap();
    assert!(field[[1, 2]].is_nan());
    assert_eq!(field[[2, 3]], 11.0);
}

#[test]
fn missing_member_directory_means_no_members() {
    let dir = tempdir().unwrap();
    assert!(discover_members(dir.path(), t("2010-01-04T00"))
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn processor_averages_members_then_longitudes() {
    let dir = tempdir().unwrap();
    write_ensemble(dir.path(), t("2010-01-04T06"));
    write_ensemble(dir.path(), t("2010-01-04T00"));

    let processor = NetcdfEnsembleProcessor::new(dir.path());
    let plan = reference_plan();
    let averages = processor
        .process(ProcessRequest {
            window: plan.window,
            variables: plan.variables.clone(),
            skip_times: BTreeSet::new(),
            num_workers: 2,
            step: plan.step,
        })
        .await
        .unwrap();

    let u = averages.get("u").unwrap();
    assert_eq!(u.times, vec![t("2010-01-04T00"), t("2010-01-04T06")]);
    assert_eq!(u.values.shape(), &[2, LEV, LAT]);
    assert_eq!(u.values[[0, 0, 0]], 2.0);
    assert_eq!(u.values[[1, 1, 2]], 12.0);
    assert_eq!(u.latitudes, vec![-60.0, 0.0, 60.0]);

    let ps = averages.get("ps").unwrap();
    assert_eq!(ps.values.shape(), &[2, LAT]);
    assert_eq!(ps.values[[0, 0]], 1000.75);
}

#[tokio::test]
async fn skipped_timestamps_are_not_read() {
    let dir = tempdir().unwrap();
    write_ensemble(dir.path(), t("2010-01-04T00"));

    let processor = NetcdfEnsembleProcessor::new(dir.path());
    let plan = reference_plan();
    let averages = processor
        .process(ProcessRequest {
            window: plan.window,
            variables: plan.variables.clone(),
            skip_times: [t("2010-01-04T00")].into(),
            num_workers: 1,
            step: plan.step,
        })
        .await
        .unwrap();

    assert!(averages.is_empty());
}

#[tokio::test]
async fn incremental_runs_commit_only_new_timestamps() {
    let dir = tempdir().unwrap();
    let data_root = dir.path().join("ensemble_data");
    let plot_dir = dir.path().join("plots");
    write_ensemble(&data_root, t("2010-01-04T00"));
    write_ensemble(&data_root, t("2010-01-04T06"));

    let store = LocalRepository::open_or_create(dir.path().join("ensemble_store"))
        .await
        .unwrap();
    let processor = NetcdfEnsembleProcessor::new(&data_root);
    let renderer = SvgHovmollerRenderer::new(&plot_dir);
    let orchestrator = Orchestrator::new(&store, &processor, &renderer);
    let plan = reference_plan();

    // First run: two of the four window times have data
    let outcome = orchestrator.run(&plan).await.unwrap();
    let RunOutcome::Committed {
        commit,
        new_timestamps,
        plots,
    } = outcome
    else {
        panic!("expected a commit");
    };
    assert_eq!(new_timestamps, 2);
    assert_eq!(
        commit.message,
        "Processed data from 2010-01-04 00:00:00 to 2010-01-05 00:00:00"
    );
    assert_eq!(
        plots,
        vec![
            plot_dir.join("hovmoeller_3d_u.svg"),
            plot_dir.join("hovmoeller_2d_ps.svg"),
        ]
    );
    for plot in &plots {
        let svg = std::fs::read_to_string(plot).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("2010-01-04 06:00:00"));
    }

    // Second run: nothing new on disk
    let outcome = orchestrator.run(&plan).await.unwrap();
    assert_eq!(outcome, RunOutcome::NothingNew { skipped: 2 });

    // Third run: one more analysis time arrives
    write_ensemble(&data_root, t("2010-01-04T12"));
    let outcome = orchestrator.run(&plan).await.unwrap();
    match outcome {
        RunOutcome::Committed { new_timestamps, .. } => assert_eq!(new_timestamps, 1),
        other => panic!("expected a commit, got {other:?}"),
    }

    let u = store.load("u").await.unwrap();
    assert_eq!(u.len(), 3);
    assert_eq!(store.existing_timestamps("ps").await.unwrap().len(), 3);

    let history: Vec<_> = store.ancestry().collect().await;
    assert_eq!(history.len(), 3);
}

#[tokio::test]
async fn unreadable_variable_fails_the_run_without_commit() {
    let dir = tempdir().unwrap();
    let data_root = dir.path().join("ensemble_data");
    write_ensemble(&data_root, t("2010-01-04T00"));

    let store = LocalRepository::open_or_create(dir.path().join("ensemble_store"))
        .await
        .unwrap();
    let head = store.head().await.unwrap();
    let processor = NetcdfEnsembleProcessor::new(&data_root);
    let renderer = SvgHovmollerRenderer::new(dir.path().join("plots"));

    let window = TimeWindow::new(t("2010-01-04T00"), t("2010-01-04T06")).unwrap();
    let plan = RunPlan::new(window, VariableSelection::new(["u", "qv"], ["ps"]).unwrap(), 1);
    let result = Orchestrator::new(&store, &processor, &renderer).run(&plan).await;

    assert!(matches!(result, Err(RuEnsError::VariableNotFound { .. })));
    assert_eq!(store.head().await.unwrap(), head);
}
