use std::{path::Path, sync::Arc};

use crate::{
    FlightError,
    estimator::{ApogeeEstimator, Estimate, Kinematics, read_table_rows},
    utils::linearly_interpolate,
};

/// Altitude gains for one velocity, `entries` are (extension, altitude gain)
/// sorted by extension.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupRow {
    pub velocity: f32,
    pub entries: Vec<(f32, f32)>,
}

/// Altitude gain over (velocity, extension), generated offline. Rows are
/// sorted by velocity and never change after loading.
#[derive(Debug, Clone)]
pub struct LookupTable {
    rows: Vec<LookupRow>,
}

impl LookupTable {
    pub fn new(mut rows: Vec<LookupRow>) -> Result<Self, String> {
        if rows.is_empty() {
            return Err("table has no rows".into());
        }

        for row in rows.iter_mut() {
            if !row.velocity.is_finite() {
                return Err(format!("non-finite velocity {}", row.velocity));
            }
            if row.entries.len() < 2 {
                return Err(format!(
                    "velocity {} has {} extension entries, at least 2 are needed",
                    row.velocity,
                    row.entries.len()
                ));
            }
            if let Some((extension, gain)) = row
                .entries
                .iter()
                .find(|(extension, gain)| !extension.is_finite() || !gain.is_finite())
            {
                return Err(format!(
                    "velocity {} has non-finite entry ({extension}, {gain})",
                    row.velocity
                ));
            }
            row.entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        }

        // generated tables are written fastest first
        rows.sort_by(|a, b| a.velocity.total_cmp(&b.velocity));

        Ok(Self { rows })
    }

    /// csv with a header row, each data row is `velocity,"[[extension, gain], ...]"`
    pub fn load(path: &Path) -> Result<Self, FlightError> {
        let mut rows = Vec::new();
        for (velocity, entries) in read_table_rows::<(f32, String)>(path)? {
            let entries: Vec<(f32, f32)> = serde_json::from_str(&entries).map_err(|e| {
                FlightError::table(path, format!("velocity {velocity}: bad entry list: {e}"))
            })?;
            rows.push(LookupRow { velocity, entries });
        }

        let table = Self::new(rows).map_err(|e| FlightError::table(path, e))?;
        log_info!(
            "loaded lookup table {} with {} rows, velocity {}..{}",
            path.display(),
            table.rows.len(),
            table.min_velocity(),
            table.max_velocity()
        );
        Ok(table)
    }

    pub fn min_velocity(&self) -> f32 {
        self.rows[0].velocity
    }

    pub fn max_velocity(&self) -> f32 {
        self.rows[self.rows.len() - 1].velocity
    }

    /// altitude gain from here to apogee, interpolated over extension within
    /// the two bordering velocity rows and then over velocity.
    /// velocity is clamped to the table range, NaN reads as the slowest row
    pub fn altitude_gain(&self, velocity: f32, extension: f32) -> f32 {
        let velocity = if velocity.is_nan() {
            self.min_velocity()
        } else {
            velocity.clamp(self.min_velocity(), self.max_velocity())
        };

        // for integer velocity steps these are the floor and ceil rows
        let lower = &self.rows[self.rows.partition_point(|row| row.velocity <= velocity) - 1];
        let upper = &self.rows[self.rows.partition_point(|row| row.velocity < velocity)];

        let lower_gain = interpolate_extension(&lower.entries, extension);
        let upper_gain = interpolate_extension(&upper.entries, extension);

        linearly_interpolate(lower.velocity, lower_gain, upper.velocity, upper_gain, velocity)
    }
}

/// entries on either side of `extension`: the pair before the first entry
/// whose extension exceeds it, the last two if none does
fn bordering_entries(entries: &[(f32, f32)], extension: f32) -> ((f32, f32), (f32, f32)) {
    match entries.iter().position(|(e, _)| extension < *e) {
        Some(0) => (entries[0], entries[1]),
        Some(i) => (entries[i - 1], entries[i]),
        None => (entries[entries.len() - 2], entries[entries.len() - 1]),
    }
}

fn interpolate_extension(entries: &[(f32, f32)], extension: f32) -> f32 {
    let ((lower_x, lower_y), (upper_x, upper_y)) = bordering_entries(entries, extension);
    linearly_interpolate(lower_x, lower_y, upper_x, upper_y, extension)
}

pub struct InterpolatedEstimator {
    table: Arc<LookupTable>,
}

impl InterpolatedEstimator {
    pub fn new(table: Arc<LookupTable>) -> Self {
        Self { table }
    }
}

impl ApogeeEstimator for InterpolatedEstimator {
    fn estimate(&self, kinematics: &Kinematics) -> Estimate {
        let gain = self
            .table
            .altitude_gain(kinematics.velocity, kinematics.extension);
        Estimate::Apogee(kinematics.altitude + gain)
    }

    fn name(&self) -> &'static str {
        "interpolated"
    }
}
