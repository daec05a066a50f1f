#[macro_use]
extern crate log;

mod scenes;

use clap::Parser;
use integrators::*;
use prb_core::app::*;
use prb_core::error::*;
use prb_core::film::*;
use prb_core::spectrum::*;
use std::collections::HashMap;
use std::process::ExitCode;

fn main() -> ExitCode {
    // Initialize `env_logger`.
    env_logger::init();

    let options = Options::parse();
    match render(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn render(options: &Options) -> Result<()> {
    let params = options.integrator_params()?;
    let integrator = create_integrator(&options.integrator, &params)?;
    let (mut scene, sensor) = scenes::build(&options.scene, &params, options.spp)?;
    params.report_unused();

    let tangents = options.tangents()?;
    for (key, _) in tangents.iter() {
        scene.enable_grad(key)?;
    }

    let outfile = options
        .image_file
        .clone()
        .unwrap_or_else(|| format!("{}.exr", options.scene));

    match options.mode {
        RenderMode::Primal => {
            let image = integrator.render(&scene, sensor.as_ref(), options.seed, options.spp)?;
            image.write(&outfile)?;
            info!("Wrote {outfile}");
        }
        RenderMode::Forward => {
            if tangents.is_empty() {
                return Err(Error::Config(
                    "tangent".to_string(),
                    "forward mode needs at least one --tangent".to_string(),
                ));
            }
            let tangents: HashMap<String, _> = tangents.into_iter().collect();
            let image = integrator.render_forward(&scene, sensor.as_ref(), &tangents, options.seed, options.spp)?;
            image.write(&outfile)?;
            info!("Wrote {outfile}");
        }
        RenderMode::Backward => {
            let size = sensor.film().size;
            let grad_in = match options.grad_in.as_deref() {
                Some(path) => Image::read(path)?,
                None => Image::constant(size, SpectrumF::one()),
            };
            integrator.render_backward(&mut scene, sensor.as_ref(), &grad_in, options.seed, options.spp)?;
            for (key, _) in tangents.iter() {
                println!("{key}: {}", scene.grad(key).unwrap_or(0.0));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prb_core::geometry::*;

    #[test]
    fn backward_mode_loads_the_adjoint_image() {
        let path = std::env::temp_dir().join(format!("prb-render-grad-in-{}.exr", std::process::id()));
        let path = path.to_string_lossy().to_string();
        Image::constant(Point2i::new(8, 8), SpectrumF::one()).write(&path).unwrap();

        let options = Options::parse_from([
            "prb-render",
            "-s",
            "occluder",
            "-m",
            "backward",
            "--spp",
            "1",
            "--tangent",
            "blocker.center.x=1",
            "--grad-in",
            &path,
        ]);
        let result = render(&options);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(Error::ImageSize(64, _))));
    }
}
