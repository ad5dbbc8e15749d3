#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    if let Err(err) = native::run() {
        eprintln!("plate_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::fs::{self, File};
    use std::io::{BufWriter, Write};
    use std::path::{Path, PathBuf};

    use clap::{Parser, Subcommand};
    use env_logger::Env;

    use tactile_plate::config::PreviewConfig;
    use tactile_plate::export::{ExportRequest, recenter_artifact};
    use tactile_plate::geom::{GeomMesh, parse_stl};
    use tactile_plate::layout::{axis_ticks, resolve_limits};
    use tactile_plate::preview::PreviewBuilder;
    use tactile_plate::scene::{FragmentKind, Stage};

    /// Tactile plate preview tooling
    #[derive(Parser)]
    #[clap(author, version, about, long_about = None)]
    struct Args {
        #[clap(subcommand)]
        cmd: Command,
    }

    #[derive(Subcommand)]
    enum Command {
        /// Build the preview for a configuration and report what it contains
        Build {
            /// JSON configuration; the default three-function plate if omitted
            config: Option<PathBuf>,

            /// Write the merged preview mesh as OBJ
            #[clap(long)]
            obj: Option<PathBuf>,

            /// Write the export service payload as JSON
            #[clap(long)]
            request: Option<PathBuf>,

            /// Overwrite existing output files
            #[clap(long)]
            overwrite: bool,
        },
        /// Decode an STL artifact and report its diagnostics
        Inspect {
            stl: PathBuf,

            /// Write the recentred artifact as OBJ
            #[clap(long)]
            obj: Option<PathBuf>,

            #[clap(long)]
            overwrite: bool,
        },
    }

    pub fn run() -> Result<(), String> {
        env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

        match Args::parse().cmd {
            Command::Build {
                config,
                obj,
                request,
                overwrite,
            } => build(config.as_deref(), obj.as_deref(), request.as_deref(), overwrite),
            Command::Inspect {
                stl,
                obj,
                overwrite,
            } => inspect(&stl, obj.as_deref(), overwrite),
        }
    }

    fn build(
        config_path: Option<&Path>,
        obj: Option<&Path>,
        request: Option<&Path>,
        overwrite: bool,
    ) -> Result<(), String> {
        let config = match config_path {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .map_err(|e| format!("read {}: {e}", path.display()))?;
                PreviewConfig::from_json(&json).map_err(|e| e.to_string())?
            }
            None => PreviewConfig::default(),
        };

        let limits = resolve_limits(&config.layout);
        let mut stage = Stage::new();
        stage.publish(PreviewBuilder::new().build_config(&config));
        let snapshot = stage
            .current()
            .ok_or_else(|| "no snapshot was published".to_string())?;

        println!(
            "plate {} x {} x {} mm",
            config.layout.plate_width_mm, config.layout.plate_height_mm, config.layout.plate_thickness_mm
        );
        println!(
            "limits x [{}, {}] ({} ticks), y [{}, {}] ({} ticks)",
            limits.x[0],
            limits.x[1],
            axis_ticks(limits.x, config.layout.tick_step).len(),
            limits.y[0],
            limits.y[1],
            axis_ticks(limits.y, config.layout.tick_step).len()
        );
        println!(
            "fragments: {} plate, {} markers ({} triangles)",
            snapshot.count(FragmentKind::Plate),
            snapshot.count(FragmentKind::Marker),
            snapshot.triangle_count()
        );
        let stats = snapshot.stats;
        println!(
            "samples: {} evaluated, {} non-finite, {} functions skipped",
            stats.sampled, stats.non_finite, stats.skipped_functions
        );
        let camera = stage.camera();
        println!(
            "camera: position {:?} target {:?} near {:.3} far {:.1}",
            camera.position.to_array(),
            camera.target.to_array(),
            camera.near,
            camera.far
        );

        if let Some(path) = obj {
            write_obj_file(path, &snapshot.merged_mesh(), "preview", overwrite)?;
            eprintln!("wrote {}", path.display());
        }
        if let Some(path) = request {
            let payload = ExportRequest::from_config(&config).map_err(|e| e.to_string())?;
            let json = serde_json::to_string_pretty(&payload).map_err(|e| e.to_string())?;
            check_overwrite(path, overwrite)?;
            fs::write(path, json).map_err(|e| format!("write {}: {e}", path.display()))?;
            eprintln!("wrote {}", path.display());
        }
        Ok(())
    }

    fn inspect(path: &Path, obj: Option<&Path>, overwrite: bool) -> Result<(), String> {
        let bytes = fs::read(path).map_err(|e| format!("read {}: {e}", path.display()))?;
        let (mesh, diagnostics) = parse_stl(&bytes).map_err(|e| e.to_string())?;
        let mesh = recenter_artifact(mesh);

        println!("{}", diagnostics.summary());
        for warning in &diagnostics.warnings {
            println!("warning: {warning}");
        }
        if let Some(bbox) = mesh.bbox() {
            let size = bbox.size();
            println!("size {:.3} x {:.3} x {:.3} mm", size.x, size.y, size.z);
        }

        if let Some(path) = obj {
            write_obj_file(path, &mesh, "artifact", overwrite)?;
            eprintln!("wrote {}", path.display());
        }
        Ok(())
    }

    fn check_overwrite(path: &Path, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }
        Ok(())
    }

    fn write_obj_file(path: &Path, mesh: &GeomMesh, name: &str, overwrite: bool) -> Result<(), String> {
        mesh.validate().map_err(|e| format!("mesh validation failed: {e}"))?;
        check_overwrite(path, overwrite)?;

        let file = File::create(path).map_err(|e| format!("create {}: {e}", path.display()))?;
        let mut w = BufWriter::new(file);

        writeln!(w, "# tactile-plate plate_cli").map_err(|e| format!("write obj: {e}"))?;
        writeln!(w, "o {name}").map_err(|e| format!("write obj: {e}"))?;

        for p in mesh.positions.iter().copied() {
            writeln!(w, "v {} {} {}", p[0], p[1], p[2]).map_err(|e| format!("write obj: {e}"))?;
        }

        if let Some(normals) = mesh.normals.as_ref() {
            for n in normals.iter().copied() {
                writeln!(w, "vn {} {} {}", n[0], n[1], n[2]).map_err(|e| format!("write obj: {e}"))?;
            }
        }

        let has_normals = mesh.normals.is_some();
        for tri in mesh.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] + 1, tri[1] + 1, tri[2] + 1);
            if has_normals {
                writeln!(w, "f {a}//{a} {b}//{b} {c}//{c}")
            } else {
                writeln!(w, "f {a} {b} {c}")
            }
            .map_err(|e| format!("write obj: {e}"))?;
        }

        w.flush().map_err(|e| format!("write obj: {e}"))
    }
}
