use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use clap::Parser;
use mbx_core::{
    ColorParameters, ColorScheme, Complex, Gradient, ImageRecord, RenderRequest, RenderedImage,
    Size, DEFAULT_FILAMENT_SIZE,
};
use mbx_render::{Frame, ProgressSink, RenderServer};
use tracing_subscriber::EnvFilter;

/// Render a view of the Mandelbrot set to an image file.
#[derive(Debug, Parser)]
#[command(name = "mbx")]
struct Args {
    /// Output image; the format follows the extension.
    output: PathBuf,

    #[arg(long, default_value_t = 500)]
    width: usize,
    #[arg(long, default_value_t = 500)]
    height: usize,

    /// Real part of the window center.
    #[arg(long, default_value_t = -0.5, allow_hyphen_values = true)]
    re: f64,
    /// Imaginary part of the window center.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    im: f64,
    /// Imaginary extent of the window.
    #[arg(long, default_value_t = 3.0)]
    zoom: f64,

    /// Iteration limit. Defaults to 1000, or 2000 for deep zooms.
    #[arg(long)]
    iterations: Option<u32>,

    /// One of: black-and-white, discrete-bands, continuous, odd-even, escape-direction,
    /// dwell-angle-radius.
    #[arg(long)]
    scheme: Option<ColorScheme>,

    /// Gradient preset: hue, rasta, argon, king-yna, terminal, jupiter, greyscale.
    #[arg(long)]
    gradient: Option<Gradient>,

    /// How quickly continuous coloring moves through the gradient.
    #[arg(long)]
    flux: Option<f64>,

    /// Distance-overlay threshold as a fraction of the zoom, in [0, 1).
    #[arg(long, value_parser = parse_filament)]
    filament: Option<f64>,

    /// Disable darkening of pixels near the boundary.
    #[arg(long)]
    no_overlay: bool,

    /// Render coarse blocks first and refine, logging each pass.
    #[arg(long)]
    progressive: bool,

    /// Size of the render pool. Defaults to the number of CPUs.
    #[arg(long)]
    threads: Option<usize>,

    /// Write the computed grid and parameters as JSON.
    #[arg(long)]
    save_record: Option<PathBuf>,

    /// Rebuild the image from a JSON record instead of rendering; color options override the
    /// record's.
    #[arg(long, conflicts_with = "progressive")]
    load_record: Option<PathBuf>,
}

fn parse_filament(s: &str) -> Result<f64, String> {
    let f: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if (0.0..1.0).contains(&f) {
        Ok(f)
    } else {
        Err(format!("filament size must be in [0, 1): {}", f))
    }
}

impl Args {
    fn request(&self) -> RenderRequest {
        let mut colors =
            ColorParameters::for_zoom(self.zoom, self.filament.unwrap_or(DEFAULT_FILAMENT_SIZE));
        self.override_colors(&mut colors);
        RenderRequest {
            size: Size {
                width: self.width,
                height: self.height,
            },
            center: Complex::new(self.re, self.im),
            zoom: self.zoom,
            max_iterations: self
                .iterations
                .unwrap_or_else(|| RenderRequest::explorer_iterations(self.zoom)),
            scheme: self.scheme.unwrap_or(ColorScheme::DiscreteBands),
            colors,
        }
    }

    fn override_colors(&self, colors: &mut ColorParameters) {
        if let Some(gradient) = &self.gradient {
            colors.gradient = gradient.clone();
        }
        if let Some(flux) = self.flux {
            colors.flux = flux;
        }
        if self.no_overlay {
            colors.show_distance_overlay = false;
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let args = Args::parse();

    let image = match &args.load_record {
        Some(path) => restore(&args, path)?,
        None => {
            let server = match args.threads {
                Some(threads) => RenderServer::with_threads(threads)?,
                None => RenderServer::new()?,
            };
            if args.progressive {
                render_progressive(&server, args.request())?
            } else {
                render(&server, args.request())?
            }
        }
    };

    if let Some(path) = &args.save_record {
        let file = BufWriter::new(File::create(path)?);
        serde_json::to_writer(file, &image.to_record())?;
        tracing::info!("wrote record to {}", path.display());
    }

    image.pixels().save(&args.output)?;
    tracing::info!(
        "wrote {}x{} image to {}",
        image.width(),
        image.height(),
        args.output.display()
    );
    Ok(())
}

fn render(
    server: &RenderServer,
    request: RenderRequest,
) -> Result<RenderedImage, mbx_render::Error> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| mbx_render::Error::Internal(format!("could not construct runtime: {}", e)))?;

    // Log at each tenth of the way.
    let mut logged = 0;
    let progress: ProgressSink = Box::new(move |fraction: f64| {
        let tenth = (fraction * 10.0).floor() as i32;
        if tenth > logged {
            logged = tenth;
            tracing::info!("{:>3}% computed", tenth * 10);
        }
    });
    rt.block_on(server.render(request, Some(progress)))
}

fn render_progressive(
    server: &RenderServer,
    request: RenderRequest,
) -> Result<RenderedImage, mbx_render::Error> {
    for frame in server.refine(request) {
        match frame? {
            Frame::Step { chunk_size, .. } => {
                tracing::info!(chunk_size, "refinement pass complete")
            }
            Frame::Finished(image) => return Ok(image),
        }
    }
    Err(mbx_render::Error::Internal(
        "refinement ended without a final image".to_string(),
    ))
}

fn restore(args: &Args, path: &Path) -> Result<RenderedImage, Box<dyn std::error::Error>> {
    let record: ImageRecord = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    let mut image = RenderedImage::from_record(record)?;
    tracing::info!(
        "restored {}x{} image centered at {} from {}",
        image.width(),
        image.height(),
        image.center(),
        path.display()
    );

    if let Some(scheme) = args.scheme {
        image.set_scheme(scheme);
    }
    let mut colors = image.colors().clone();
    args.override_colors(&mut colors);
    image.set_colors(colors)?;
    if let Some(filament) = args.filament {
        image.set_filament_size(filament)?;
    }
    image.recolor();
    Ok(image)
}
