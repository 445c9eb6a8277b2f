use std::{
    error::Error,
    fmt::{self, Display, Formatter},
    path::{Path, PathBuf},
    sync::Arc,
};

use glam::Mat4;
use log::info;
use skinning::{
    asset::{
        format::ModelFormatError,
        loader::{
            gltf::{import_gltf, GltfImportError},
            ImportParams,
        },
        model::Model,
        node::{NodeId, SceneGraph},
    },
    AnimationPlayer, PlayerError,
};

/// Step used by the `sample` command, in seconds.
const SAMPLE_STEP: f32 = 1.0 / 60.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Convert {
        input: PathBuf,
        output: PathBuf,
    },
    Inspect {
        input: PathBuf,
    },
    Sample {
        input: PathBuf,
        clip: String,
        seconds: f32,
        exact: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageError(pub String);

impl Display for UsageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for UsageError {}

pub const USAGE: &str = "\
Usage:
    skinning-pipeline convert <input.gltf|input.glb> [output.bin]
    skinning-pipeline inspect <model.bin>
    skinning-pipeline sample <model.bin> <clip> <seconds> [--exact]";

impl Command {
    pub fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, UsageError> {
        let name = args
            .next()
            .ok_or_else(|| UsageError(String::from("Missing command")))?;
        let mut positional = Vec::new();
        let mut exact = false;
        for arg in args {
            match arg.as_str() {
                "--exact" => exact = true,
                flag if flag.starts_with("--") => {
                    return Err(UsageError(format!("Unknown flag {}", flag)))
                }
                _ => positional.push(arg),
            }
        }

        let command = match (name.as_str(), positional.as_slice()) {
            ("convert", [input]) => {
                let input = PathBuf::from(input);
                let output = input.with_extension("bin");
                Command::Convert { input, output }
            }
            ("convert", [input, output]) => Command::Convert {
                input: PathBuf::from(input),
                output: PathBuf::from(output),
            },
            ("inspect", [input]) => Command::Inspect {
                input: PathBuf::from(input),
            },
            ("sample", [input, clip, seconds]) => {
                let seconds = seconds
                    .parse::<f32>()
                    .ok()
                    .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
                    .ok_or_else(|| UsageError(format!("Bad duration {}", seconds)))?;
                Command::Sample {
                    input: PathBuf::from(input),
                    clip: clip.clone(),
                    seconds,
                    exact,
                }
            }
            ("convert" | "inspect" | "sample", _) => {
                return Err(UsageError(format!("Wrong arguments for {}", name)))
            }
            _ => return Err(UsageError(format!("Unknown command {}", name))),
        };
        if exact && !matches!(command, Command::Sample { .. }) {
            return Err(UsageError(String::from("--exact only applies to sample")));
        }
        Ok(command)
    }

    pub fn run(self) -> Result<(), PipelineError> {
        match self {
            Command::Convert { input, output } => convert(&input, &output),
            Command::Inspect { input } => inspect(&input),
            Command::Sample {
                input,
                clip,
                seconds,
                exact,
            } => sample(&input, &clip, seconds, exact),
        }
    }
}

#[derive(Debug)]
pub enum PipelineError {
    Import(GltfImportError),
    Format(ModelFormatError),
    Player(PlayerError),
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Import(err) => write!(f, "Failed to import model: {}", err),
            PipelineError::Format(err) => write!(f, "Model file error: {}", err),
            PipelineError::Player(err) => write!(f, "Playback error: {}", err),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::Import(err) => Some(err),
            PipelineError::Format(err) => Some(err),
            PipelineError::Player(err) => Some(err),
        }
    }
}

impl From<GltfImportError> for PipelineError {
    fn from(value: GltfImportError) -> Self {
        Self::Import(value)
    }
}

impl From<ModelFormatError> for PipelineError {
    fn from(value: ModelFormatError) -> Self {
        Self::Format(value)
    }
}

impl From<PlayerError> for PipelineError {
    fn from(value: PlayerError) -> Self {
        Self::Player(value)
    }
}

fn convert(input: &Path, output: &Path) -> Result<(), PipelineError> {
    info!("Reading {}", input.display());
    let model = import_gltf(input, &ImportParams::default())?;
    info!(
        "Imported {} meshes, {} materials, {} bones, {} clips",
        model.meshes().len(),
        model.materials().len(),
        model.bone_count(),
        model.clips().len()
    );
    info!("Writing {}", output.display());
    model.save_file(output)?;
    info!("Finished");
    Ok(())
}

fn print_tree(graph: &SceneGraph, id: NodeId, depth: usize) {
    let node = &graph[id];
    match node.as_bone() {
        Some(bone) => println!(
            "{:indent$}{} (bone {})",
            "",
            node.name(),
            bone.index(),
            indent = depth * 2
        ),
        None => println!("{:indent$}{}", "", node.name(), indent = depth * 2),
    }
    for child in node.children() {
        print_tree(graph, *child, depth + 1);
    }
}

fn inspect(input: &Path) -> Result<(), PipelineError> {
    let model = Model::load_file(input)?;

    println!("Materials: {}", model.materials().len());
    for material in model.materials() {
        println!("  {} ({} textures)", material.name, material.textures.len());
    }
    println!("Meshes: {}", model.meshes().len());
    for mesh in model.meshes() {
        println!(
            "  {}: {} vertices, {} faces, material {}{}",
            mesh.name,
            mesh.vertex_count(),
            mesh.face_count,
            mesh.material_index,
            if mesh.is_skinned() { ", skinned" } else { "" }
        );
    }
    println!("Bones: {}", model.bone_count());
    if let Some(root) = model.root() {
        println!("Hierarchy:");
        print_tree(model.scene_graph(), root, 1);
    }
    println!("Clips: {}", model.clips().len());
    for clip in model.clips() {
        println!(
            "  {}: {} ticks at {} ticks/s, {} tracks, {} keyframes",
            clip.name(),
            clip.duration(),
            clip.ticks_per_second(),
            clip.tracks().len(),
            clip.keyframe_count()
        );
    }
    Ok(())
}

fn print_matrix(index: usize, matrix: &Mat4) {
    let cols = matrix.to_cols_array_2d();
    println!("  bone {}:", index);
    for row in 0..4 {
        println!(
            "    {:>9.4} {:>9.4} {:>9.4} {:>9.4}",
            cols[0][row], cols[1][row], cols[2][row], cols[3][row]
        );
    }
}

fn sample(input: &Path, clip: &str, seconds: f32, exact: bool) -> Result<(), PipelineError> {
    let model = Arc::new(Model::load_file(input)?);
    let mut player = AnimationPlayer::new(model, !exact);
    player.set_looping(false);
    player.start_clip_by_name(clip)?;

    let mut elapsed = 0.0;
    while elapsed + SAMPLE_STEP <= seconds && player.is_playing() {
        player.advance(SAMPLE_STEP);
        elapsed += SAMPLE_STEP;
    }

    println!(
        "Clip {} at {:.3}s (tick {:.3}, keyframe {}, {:?})",
        clip,
        elapsed,
        player.current_time(),
        player.current_keyframe(),
        player.state()
    );
    for (index, matrix) in player.bone_transforms().iter().enumerate() {
        print_matrix(index, matrix);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use super::{Command, UsageError};

    fn parse(args: &[&str]) -> Result<Command, UsageError> {
        Command::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn test_parse_convert() {
        assert_eq!(
            parse(&["convert", "assets/fox.glb"]),
            Ok(Command::Convert {
                input: PathBuf::from("assets/fox.glb"),
                output: PathBuf::from("assets/fox.bin"),
            })
        );
        assert_eq!(
            parse(&["convert", "fox.gltf", "out/fox.model"]),
            Ok(Command::Convert {
                input: PathBuf::from("fox.gltf"),
                output: PathBuf::from("out/fox.model"),
            })
        );
    }

    #[test]
    fn test_parse_sample() {
        assert_eq!(
            parse(&["sample", "fox.bin", "run", "1.5", "--exact"]),
            Ok(Command::Sample {
                input: PathBuf::from("fox.bin"),
                clip: String::from("run"),
                seconds: 1.5,
                exact: true,
            })
        );
        assert!(parse(&["sample", "fox.bin", "run", "-1"]).is_err());
        assert!(parse(&["sample", "fox.bin", "run", "soon"]).is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["render", "fox.bin"]).is_err());
        assert!(parse(&["inspect"]).is_err());
        assert!(parse(&["inspect", "fox.bin", "--exact"]).is_err());
        assert!(parse(&["inspect", "fox.bin", "--verbose"]).is_err());
    }
}
