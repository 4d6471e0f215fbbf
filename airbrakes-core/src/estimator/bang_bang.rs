use std::{path::Path, sync::Arc};

use crate::{
    FlightError,
    estimator::{ApogeeEstimator, Estimate, Kinematics, read_table_rows},
    utils::linearly_interpolate,
};

/// (velocity, altitude gain at full extension), sorted by velocity.
#[derive(Debug, Clone)]
pub struct BangBangTable {
    rows: Vec<(f32, f32)>,
}

impl BangBangTable {
    pub fn new(mut rows: Vec<(f32, f32)>) -> Result<Self, String> {
        if rows.is_empty() {
            return Err("table has no rows".into());
        }
        if let Some((velocity, gain)) = rows
            .iter()
            .find(|(velocity, gain)| !velocity.is_finite() || !gain.is_finite())
        {
            return Err(format!("non-finite row ({velocity}, {gain})"));
        }
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Self { rows })
    }

    /// csv with a header row, each data row is `velocity,altitude_gain`
    pub fn load(path: &Path) -> Result<Self, FlightError> {
        let rows = read_table_rows::<(f32, f32)>(path)?;
        let table = Self::new(rows).map_err(|e| FlightError::table(path, e))?;
        log_info!(
            "loaded bang-bang table {} with {} rows",
            path.display(),
            table.rows.len()
        );
        Ok(table)
    }

    /// velocity is clamped to the table range
    pub fn altitude_gain(&self, velocity: f32) -> f32 {
        let first = self.rows[0];
        let last = self.rows[self.rows.len() - 1];
        let velocity = velocity.clamp(first.0, last.0);

        let upper_index = self
            .rows
            .partition_point(|(v, _)| *v < velocity)
            .max(1)
            .min(self.rows.len() - 1);
        let Some(lower_index) = upper_index.checked_sub(1) else {
            return first.1;
        };
        let (lower_v, lower_gain) = self.rows[lower_index];
        let (upper_v, upper_gain) = self.rows[upper_index];
        linearly_interpolate(lower_v, lower_gain, upper_v, upper_gain, velocity)
    }
}

/// Deploys fully whenever coasting with the brakes out would still overshoot.
pub struct BangBangEstimator {
    table: Arc<BangBangTable>,
    target_apogee: f32,
}

impl BangBangEstimator {
    pub fn new(table: Arc<BangBangTable>, target_apogee: f32) -> Self {
        Self {
            table,
            target_apogee,
        }
    }
}

impl ApogeeEstimator for BangBangEstimator {
    fn estimate(&self, kinematics: &Kinematics) -> Estimate {
        let projected = kinematics.altitude + self.table.altitude_gain(kinematics.velocity);
        Estimate::Deploy(projected > self.target_apogee)
    }

    fn name(&self) -> &'static str {
        "bang-bang"
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn table() -> BangBangTable {
        BangBangTable::new(vec![(300.0, 2000.0), (100.0, 400.0), (200.0, 1100.0)]).unwrap()
    }

    #[test]
    fn interpolates_between_velocities() {
        let table = table();
        assert_relative_eq!(table.altitude_gain(150.0), 750.0, epsilon = 1e-3);
        assert_relative_eq!(table.altitude_gain(250.0), 1550.0, epsilon = 1e-3);
    }

    #[test]
    fn exact_rows() {
        let table = table();
        assert_eq!(table.altitude_gain(100.0), 400.0);
        assert_eq!(table.altitude_gain(200.0), 1100.0);
        assert_eq!(table.altitude_gain(300.0), 2000.0);
    }

    #[test]
    fn clamps_outside_range() {
        let table = table();
        assert_eq!(table.altitude_gain(0.0), 400.0);
        assert_eq!(table.altitude_gain(-20.0), 400.0);
        assert_eq!(table.altitude_gain(900.0), 2000.0);
    }

    #[test]
    fn single_row_table() {
        let table = BangBangTable::new(vec![(50.0, 80.0)]).unwrap();
        assert_eq!(table.altitude_gain(10.0), 80.0);
        assert_eq!(table.altitude_gain(90.0), 80.0);
    }

    #[test]
    fn deploy_decision() {
        let estimator = BangBangEstimator::new(Arc::new(table()), 1500.0);
        let at = |altitude: f32| {
            estimator.estimate(&Kinematics {
                altitude,
                velocity: 200.0,
                extension: 0.0,
            })
        };
        // 1100 gain: overshoot above 400m, exactly on target retracts
        assert_eq!(at(401.0), Estimate::Deploy(true));
        assert_eq!(at(400.0), Estimate::Deploy(false));
        assert_eq!(at(100.0), Estimate::Deploy(false));
    }
}
