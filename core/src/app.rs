//! Application related stuff

use crate::error::*;
use crate::paramset::*;
use crate::pbrt::*;
use clap::{Parser, ValueEnum};

/// Rendering mode selected on the command line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum RenderMode {
    /// Render the image.
    Primal,

    /// Render the derivative image along the `--tangent` parameters.
    Forward,

    /// Backpropagate an adjoint image and print the gradients.
    Backward,
}

/// System wide options.
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Options {
    /// Number of threads to use for rendering.
    #[arg(
        long = "nthreads",
        short = 't',
        value_name = "NUM",
        default_value_t = 0,
        help = "Use specified number of threads for rendering (0 uses all cores)."
    )]
    pub n_threads: usize,

    /// Built-in scene to render.
    #[arg(long, short = 's', default_value = "cornell", help = "Built-in scene: cornell, occluder, acoustic.")]
    pub scene: String,

    /// Rendering mode.
    #[arg(long, short = 'm', value_enum, default_value_t = RenderMode::Primal)]
    pub mode: RenderMode,

    /// Integrator name.
    #[arg(
        long,
        short = 'i',
        default_value = "prb_threepoint",
        help = "One of prb_threepoint, ad_threepoint, prb_projective, prb_acoustic."
    )]
    pub integrator: String,

    /// Samples per pixel.
    #[arg(long, value_name = "NUM", default_value_t = 16)]
    pub spp: usize,

    /// Seed of the sampler streams.
    #[arg(long, value_name = "NUM", default_value_t = 0)]
    pub seed: u64,

    /// Path to the image file.
    #[arg(
        long = "outfile",
        short = 'o',
        value_name = "FILE",
        help = "Write the final image to the given filename."
    )]
    pub image_file: Option<String>,

    /// Adjoint image for backward mode.
    #[arg(
        long = "grad-in",
        value_name = "FILE",
        help = "OpenEXR adjoint image for backward mode; defaults to all ones."
    )]
    pub grad_in: Option<String>,

    /// Scene parameters to differentiate, with their tangents.
    #[arg(long = "tangent", value_name = "KEY=VALUE", help = "Differentiate a scene parameter, e.g. light.scale=1.")]
    pub tangents: Vec<String>,

    /// Integrator parameter overrides.
    #[arg(long = "param", short = 'p', value_name = "NAME=VALUE", help = "Integrator parameter, e.g. max_depth=4.")]
    pub params: Vec<String>,
}

impl Options {
    /// Returns the number of threads to use.
    pub fn threads(&self) -> usize {
        let max_threads = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        match self.n_threads {
            0 => max_threads,
            n if n > max_threads => {
                warn!("Num threads > max logical CPUs {}", max_threads);
                max_threads
            }
            n => n,
        }
    }

    /// Returns the integrator parameters given with `--param`, with the
    /// thread count added.
    pub fn integrator_params(&self) -> Result<ParamSet> {
        let mut params = ParamSet::new();
        params.add_int("threads", &[self.threads() as Int]);
        for p in self.params.iter() {
            params.add_assignment(p)?;
        }
        Ok(params)
    }

    /// Returns the `--tangent` assignments as `(key, tangent)` pairs.
    pub fn tangents(&self) -> Result<Vec<(String, Float)>> {
        self.tangents
            .iter()
            .map(|t| {
                let (key, value) = t
                    .split_once('=')
                    .ok_or_else(|| Error::Config(t.clone(), "expected key=value".to_string()))?;
                let value = value
                    .trim()
                    .parse::<Float>()
                    .map_err(|e| Error::Config(t.clone(), e.to_string()))?;
                Ok((key.trim().to_string(), value))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tangents_and_params() {
        let options = Options::parse_from([
            "prb-render",
            "--mode",
            "forward",
            "--tangent",
            "light.scale=1.5",
            "-p",
            "max_depth=3",
        ]);
        assert_eq!(options.mode, RenderMode::Forward);
        assert_eq!(options.grad_in, None);
        assert_eq!(options.tangents().unwrap(), vec![("light.scale".to_string(), 1.5)]);
        let params = options.integrator_params().unwrap();
        assert_eq!(params.find_one_int("max_depth", 0), 3);
    }

    #[test]
    fn backward_reads_adjoint_path() {
        let options = Options::parse_from(["prb-render", "-m", "backward", "--grad-in", "loss.exr"]);
        assert_eq!(options.mode, RenderMode::Backward);
        assert_eq!(options.grad_in.as_deref(), Some("loss.exr"));
    }

    #[test]
    fn rejects_malformed_tangent() {
        let options = Options::parse_from(["prb-render", "--tangent", "light.scale"]);
        assert!(options.tangents().is_err());
    }
}
