//! Creates a synthetic ensemble for trying out RuEns locally.
//!
//! Writes `ensemble_data/<YYYYmmdd_HH>/memNNN.nc4` for every 6-hourly time of
//! 2010-01-04, holding all default 3-D and 2-D variables.

use chrono::Duration;
use ndarray::{Array1, Array3, Array4};
use netcdf::create;
use ru_ens::ensemble_io::member_dir;
use ru_ens::time_window::{parse_timestamp, TimeWindow};
use ru_ens::variables::default_variables;
use std::f32::consts::PI;
use std::path::Path;

const MEMBERS: usize = 4;
const LEV: usize = 4;
const LAT: usize = 9;
const LON: usize = 12;
const FILL: f32 = 1.0e15;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let data_root = Path::new("ensemble_data");
    let window = TimeWindow::new(
        parse_timestamp("2010-01-04T00")?,
        parse_timestamp("2010-01-05T00")?,
    )?;
    let (var3d, var2d) = default_variables();

    println!("🔨 Creating test ensemble in {}", data_root.display());

    for (step, time) in window.timestamps(Duration::hours(6))?.into_iter().enumerate() {
        let dir = member_dir(data_root, time);
        std::fs::create_dir_all(&dir)?;

        for member in 0..MEMBERS {
            let path = dir.join(format!("mem{:03}.nc4", member + 1));
            if path.exists() {
                std::fs::remove_file(&path)?
            }

            let mut file = create(&path)?;
            file.add_attribute("title", "Synthetic ensemble member")?;
            file.add_attribute("created_by", "create_test_ensemble.rs")?;

            file.add_dimension("time", 1)?;
            file.add_dimension("lev", LEV)?;
            file.add_dimension("lat", LAT)?;
            file.add_dimension("lon", LON)?;

            {
                let mut lat_var = file.add_variable::<f32>("lat", &["lat"])?;
                lat_var.put_attribute("units", "degrees_north")?;
                let lat_data: Vec<f32> = (0..LAT).map(|i| -80.0 + i as f32 * 20.0).collect();
                lat_var.put(Array1::from(lat_data).view(), ..)?;
            }

            // Perturbation grows with member index and drifts with time
            let spread = (member as f32 - (MEMBERS as f32 - 1.0) / 2.0) * 0.5;
            let drift = step as f32 * 0.25;

            for (v, name) in var3d.iter().enumerate() {
                let mut var = file.add_variable::<f32>(name, &["time", "lev", "lat", "lon"])?;
                var.put_attribute("_FillValue", FILL)?;
                let data = Array4::from_shape_fn((1, LEV, LAT, LON), |(_, lev, lat, lon)| {
                    if lat == 0 && lon == 0 && member == 0 {
                        return FILL;
                    }
                    let phase = lat as f32 / (LAT - 1) as f32 * PI;
                    let wave = (lon as f32 / LON as f32 * 2.0 * PI).sin();
                    10.0 * v as f32 + 5.0 * phase.sin() * (lev + 1) as f32 + wave + spread + drift
                });
                var.put(data.view(), ..)?;
            }

            for (v, name) in var2d.iter().enumerate() {
                let mut var = file.add_variable::<f32>(name, &["time", "lat", "lon"])?;
                var.put_attribute("_FillValue", FILL)?;
                let data = Array3::from_shape_fn((1, LAT, LON), |(_, lat, lon)| {
                    let phase = lat as f32 / (LAT - 1) as f32 * PI;
                    let wave = (lon as f32 / LON as f32 * 2.0 * PI).cos();
                    100.0 * (v + 1) as f32 - 20.0 * phase.cos() + wave + spread - drift
                });
                var.put(data.view(), ..)?;
            }
        }

        println!("   📁 {} ({MEMBERS} members)", dir.display());
    }

    println!("✅ Successfully created test ensemble with:");
    println!("   📏 Dimensions: time(1), lev({LEV}), lat({LAT}), lon({LON})");
    println!("   📈 3D variables: {}", var3d.join(", "));
    println!("   📈 2D variables: {}", var2d.join(", "));
    println!("\n🧪 Run the pipeline with:");
    println!("   cargo run -- --var3d u,t --var2d ps,slp");

    Ok(())
}
