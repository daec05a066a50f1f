//! Common

use crate::error::*;
use crate::paramset::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::thread;

/// Seed perturbation of the primarily visible discontinuity pass.
pub const SEED_PRIMARY_DISCONTINUITY: u64 = 0x2f5c_a31b_9d07_e6e5;

/// Seed perturbation of the indirect discontinuity pass.
pub const SEED_INDIRECT_DISCONTINUITY: u64 = 0x7a3e_9c54_18b2_d4f0;

/// Seed perturbation of the guiding construction pass.
pub const SEED_GUIDING: u64 = 0x5ee1_c0de_3b6f_a871;

/// Largest number of samples a single pass can address.
pub const MAX_WAVEFRONT_SIZE: u64 = 1 << 32;

/// Settings shared by all differentiable path tracers.
#[derive(Copy, Clone, Debug)]
pub struct IntegratorConfig {
    /// Longest path depth; `u32::MAX` means unbounded.
    pub max_depth: u32,

    /// Depth at which Russian roulette starts.
    pub rr_depth: u32,

    /// Hide directly visible emitters.
    pub hide_emitters: bool,

    /// Number of worker threads.
    pub threads: usize,

    /// Edge length of the square pixel tiles handed to workers.
    pub tile_size: i32,

    /// Whether points sampled on delta-position emitters stay attached to
    /// their parameters.
    pub delta_emitter_attached: bool,
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            rr_depth: 5,
            hide_emitters: false,
            threads: default_threads(),
            tile_size: 16,
            delta_emitter_attached: true,
        }
    }
}

impl TryFrom<&ParamSet> for IntegratorConfig {
    type Error = Error;

    /// Create an `IntegratorConfig` from `ParamSet`.
    ///
    /// * `params` - Parameter set.
    fn try_from(params: &ParamSet) -> Result<Self> {
        let defaults = Self::default();

        let max_depth = match params.find_one_int("max_depth", defaults.max_depth as i32) {
            -1 => u32::MAX,
            d if d >= 1 => d as u32,
            d => {
                return Err(Error::Config(
                    "max_depth".to_string(),
                    format!("{} (must be -1 or at least 1)", d),
                ))
            }
        };

        let rr_depth = params.find_one_int("rr_depth", defaults.rr_depth as i32);
        if rr_depth < 1 {
            return Err(Error::Config(
                "rr_depth".to_string(),
                format!("{} (must be at least 1)", rr_depth),
            ));
        }

        let threads = match params.find_one_int("threads", 0) {
            n if n > 0 => n as usize,
            0 => defaults.threads,
            n => return Err(Error::Config("threads".to_string(), format!("{}", n))),
        };

        let tile_size = params.find_one_int("tile_size", defaults.tile_size);
        if tile_size < 1 {
            return Err(Error::Config("tile_size".to_string(), format!("{}", tile_size)));
        }

        Ok(Self {
            max_depth,
            rr_depth: rr_depth as u32,
            hide_emitters: params.find_one_bool("hide_emitters", defaults.hide_emitters),
            threads,
            tile_size,
            delta_emitter_attached: params.find_one_bool("delta_emitter_attached", defaults.delta_emitter_attached),
        })
    }
}

/// Returns the number of logical CPUs.
pub fn default_threads() -> usize {
    thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Returns an error when a pass would address more than 2³² samples.
///
/// * `count` - Total number of samples of the pass.
pub fn check_wavefront(count: u64) -> Result<()> {
    if count > MAX_WAVEFRONT_SIZE {
        Err(Error::WavefrontOverflow(count))
    } else {
        Ok(())
    }
}

/// Returns a progress bar.
///
/// * `len` - Number of steps.
pub fn create_progress_bar(len: u64) -> ProgressBar {
    let progress = ProgressBar::new(len);
    let style = ProgressStyle::with_template("{msg:20} [{elapsed_precise}] {wide_bar} {pos:>6}/{len:6}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress.set_style(style);
    progress
}

/// Runs `n_jobs` independent jobs on a pool of worker threads and returns
/// their results in job order. Jobs are handed out through a bounded
/// channel.
///
/// * `n_jobs`    - Number of jobs.
/// * `n_threads` - Number of worker threads.
/// * `label`     - Progress message.
/// * `f`         - Job body.
pub fn parallel_for<T, F>(n_jobs: usize, n_threads: usize, label: &str, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    let n_threads = n_threads.clamp(1, n_jobs.max(1));
    let progress = create_progress_bar(n_jobs as u64);
    progress.set_message(label.to_string());

    let mut results: Vec<Option<T>> = (0..n_jobs).map(|_| None).collect();

    thread::scope(|scope| {
        let (tx, rx) = crossbeam_channel::bounded::<usize>(n_threads);
        let (tx_result, rx_result) = crossbeam_channel::unbounded::<(usize, T)>();

        // Spawn worker threads.
        for _ in 0..n_threads {
            let rxc = rx.clone();
            let txr = tx_result.clone();
            let f = &f;
            let progress = &progress;
            scope.spawn(move || {
                for job in rxc.iter() {
                    if txr.send((job, f(job))).is_err() {
                        break;
                    }
                    progress.inc(1);
                }
            });
        }
        drop(rx);
        drop(tx_result);

        // Send work.
        for job in 0..n_jobs {
            if tx.send(job).is_err() {
                break;
            }
        }
        drop(tx);

        for (job, result) in rx_result.iter() {
            results[job] = Some(result);
        }
    });

    progress.finish_and_clear();
    results.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_for_preserves_job_order() {
        let v = parallel_for(37, 4, "test", |i| i * i);
        assert_eq!(v.len(), 37);
        assert!(v.iter().enumerate().all(|(i, x)| *x == i * i));
    }

    #[test]
    fn wavefront_limit() {
        assert!(check_wavefront(1 << 32).is_ok());
        assert!(matches!(check_wavefront((1 << 32) + 1), Err(Error::WavefrontOverflow(_))));
    }

    #[test]
    fn config_rejects_invalid_depths() {
        let mut params = ParamSet::new();
        params.add_int("max_depth", &[0]);
        assert!(IntegratorConfig::try_from(&params).is_err());

        let mut params = ParamSet::new();
        params.add_int("max_depth", &[-1]);
        params.add_int("rr_depth", &[0]);
        assert!(IntegratorConfig::try_from(&params).is_err());

        let mut params = ParamSet::new();
        params.add_int("max_depth", &[-1]);
        let config = IntegratorConfig::try_from(&params).unwrap();
        assert_eq!(config.max_depth, u32::MAX);
    }
}
