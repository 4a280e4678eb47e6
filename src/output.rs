use crate::features::FeatureSet;
use anyhow::{ensure, Result};
use std::io::Write;
use std::path::Path;

const FEATURE_COLUMNS: [&str; 4] = ["phase", "frequency", "amplitude", "movement"];

fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

/// Writes one row per sample: the sample index, then phase, frequency, amplitude and the
/// movement flag for every channel. Masked (NaN) values are left empty.
pub fn write_features<W: Write>(
    writer: W,
    channel_names: &[String],
    features: &FeatureSet,
) -> Result<()> {
    let (channels, samples) = features.phase.dim();
    ensure!(
        channel_names.len() == channels,
        "{} channel names for {} channels",
        channel_names.len(),
        channels
    );

    let mut writer = csv::Writer::from_writer(writer);

    let mut header = vec!["sample".to_string()];
    for name in channel_names {
        header.extend(FEATURE_COLUMNS.iter().map(|column| format!("{}_{}", name, column)));
    }
    writer.write_record(&header)?;

    for sample in 0..samples {
        let mut record = Vec::with_capacity(1 + channels * FEATURE_COLUMNS.len());
        record.push(sample.to_string());
        for channel in 0..channels {
            record.push(format_value(features.phase[[channel, sample]]));
            record.push(format_value(features.frequency[[channel, sample]]));
            record.push(format_value(features.amplitude[[channel, sample]]));
            record.push(u8::from(features.movement_mask[[channel, sample]]).to_string());
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_features_to_csv(
    path: &Path,
    channel_names: &[String],
    features: &FeatureSet,
) -> Result<()> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }

    println!("Writing results to {}", path.display());
    let file = std::fs::File::create(path)?;
    write_features(file, channel_names, features)
}
