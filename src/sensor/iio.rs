use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::poller::Poller;
use super::{Accelerometer, SamplingRate, SensorEvents};
use crate::error::SensorError;
use crate::types::Reading;

pub const IIO_DEVICES_DIR: &str = "/sys/bus/iio/devices";

/// Linux Industrial I/O accelerometer read through sysfs.
///
/// Each sample reads `in_accel_{x,y,z}_raw` and converts with
/// `(raw + offset) * scale`, which the kernel defines in m/s².
pub struct IioAccelerometer {
    device: Option<PathBuf>,
    max_consecutive_errors: u32,
    poller: Option<Poller>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Calibration {
    scale: [f64; 3],
    offset: [f64; 3],
}

const AXES: [&str; 3] = ["x", "y", "z"];

impl IioAccelerometer {
    /// Use a specific device directory, e.g. `/sys/bus/iio/devices/iio:device0`.
    pub fn new(device: impl Into<PathBuf>, max_consecutive_errors: u32) -> Self {
        Self {
            device: Some(device.into()),
            max_consecutive_errors,
            poller: None,
        }
    }

    /// First accelerometer found under [`IIO_DEVICES_DIR`], if any.
    pub fn discover(max_consecutive_errors: u32) -> Self {
        Self::discover_in(Path::new(IIO_DEVICES_DIR), max_consecutive_errors)
    }

    pub fn discover_in(root: &Path, max_consecutive_errors: u32) -> Self {
        let device = find_accelerometer(root);
        match &device {
            Some(path) => info!("Found IIO accelerometer at {}", path.display()),
            None => debug!("No IIO accelerometer under {}", root.display()),
        }
        Self {
            device,
            max_consecutive_errors,
            poller: None,
        }
    }

    pub fn device(&self) -> Option<&Path> {
        self.device.as_deref()
    }
}

fn is_accelerometer(dir: &Path) -> bool {
    AXES.iter().all(|axis| dir.join(format!("in_accel_{}_raw", axis)).is_file())
}

fn find_accelerometer(root: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = fs::read_dir(root)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_accelerometer(path))
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

fn read_value(path: &Path) -> io::Result<f64> {
    let text = fs::read_to_string(path)?;
    text.trim()
        .parse::<f64>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{}: {}", path.display(), e)))
}

/// Per-axis attribute, falling back to the shared one, then to `default`.
fn read_attribute(dir: &Path, axis: &str, attr: &str, default: f64) -> io::Result<f64> {
    let per_axis = dir.join(format!("in_accel_{}_{}", axis, attr));
    if per_axis.is_file() {
        return read_value(&per_axis);
    }
    let shared = dir.join(format!("in_accel_{}", attr));
    if shared.is_file() {
        return read_value(&shared);
    }
    Ok(default)
}

fn load_calibration(dir: &Path) -> io::Result<Calibration> {
    let mut calibration = Calibration {
        scale: [1.0; 3],
        offset: [0.0; 3],
    };
    for (i, axis) in AXES.iter().enumerate() {
        calibration.scale[i] = read_attribute(dir, axis, "scale", 1.0)?;
        calibration.offset[i] = read_attribute(dir, axis, "offset", 0.0)?;
    }
    Ok(calibration)
}

fn read_sample(dir: &Path, calibration: &Calibration) -> io::Result<Reading> {
    let mut values = [0.0; 3];
    for (i, axis) in AXES.iter().enumerate() {
        let raw = read_value(&dir.join(format!("in_accel_{}_raw", axis)))?;
        values[i] = (raw + calibration.offset[i]) * calibration.scale[i];
    }
    Ok(Reading::now(values[0], values[1], values[2]))
}

impl Accelerometer for IioAccelerometer {
    fn name(&self) -> &str {
        "iio"
    }

    fn is_supported(&self) -> bool {
        self.device.as_deref().is_some_and(is_accelerometer)
    }

    fn open(&mut self, rate: SamplingRate, events: SensorEvents) -> Result<(), SensorError> {
        let dir = self.device.clone().ok_or(SensorError::UnsupportedDevice)?;

        // 先读取一次，权限或驱动问题在启动时暴露
        let calibration = load_calibration(&dir).map_err(|e| SensorError::StartFailure(e.to_string()))?;
        read_sample(&dir, &calibration).map_err(|e| SensorError::StartFailure(e.to_string()))?;

        let poller = Poller::spawn("iio", rate.period(), self.max_consecutive_errors, events, move || {
            read_sample(&dir, &calibration).map_err(|e| e.to_string())
        })
        .map_err(|e| SensorError::StartFailure(e.to_string()))?;

        self.poller = Some(poller);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.shutdown();
        }
    }
}
