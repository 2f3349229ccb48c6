use std::path::PathBuf;

use anyhow::{ensure, Context, Result};
use argh::FromArgs;
use binrw::Endian;
use dtslib::{
    format::{
        sequence::{Sequence, SequenceFile},
        shape::ShapeModel,
        NATIVE_ENDIAN,
    },
    util::{
        file::{map_file, FileKind},
        resolve::PathResolver,
    },
};

use crate::cmd::{load_sequence_files, parse_endian};

#[derive(FromArgs, PartialEq, Debug)]
/// print a summary of a DTS or DSQ file
#[argh(subcommand, name = "info")]
pub struct Args {
    #[argh(positional)]
    /// input file
    input: PathBuf,
    #[argh(positional)]
    /// external DSQ files animating the input shape
    sequences: Vec<PathBuf>,
    #[argh(option, short = 'e', from_str_fn(parse_endian), default = "NATIVE_ENDIAN")]
    /// byte order: little, big or native
    endian: Endian,
    #[argh(option, short = 's')]
    /// additional texture search directory
    search: Vec<PathBuf>,
}

pub fn run(args: Args) -> Result<()> {
    let kind = FileKind::from_path(&args.input)?;
    let data = map_file(&args.input)?;
    log::info!("Reading {} {}", kind, args.input.display());
    match kind {
        FileKind::Shape => {
            let shape = ShapeModel::slice(&data, args.endian)
                .with_context(|| format!("Failed to decode '{}'", args.input.display()))?;
            let mut resolver = PathResolver::new();
            resolver.add_path_containing(&args.input);
            let files = load_sequence_files(&args.sequences, args.endian, &mut resolver)?;
            for dir in args.search {
                resolver.add_dir(dir);
            }
            shape_info(&shape, &resolver);
            for (path, file) in &files {
                log::info!("External sequences from {}:", path.display());
                for sequence in &file.sequences {
                    log_sequence(sequence, &file.names);
                }
            }
        }
        FileKind::Sequence => {
            ensure!(
                args.sequences.is_empty(),
                "External sequence files need a base shape, got '{}'",
                args.input.display()
            );
            let file = SequenceFile::slice(&data, args.endian)
                .with_context(|| format!("Failed to decode '{}'", args.input.display()))?;
            sequence_file_info(&file);
        }
    }
    Ok(())
}

fn shape_info(shape: &ShapeModel, resolver: &PathResolver) {
    let stats = shape.stats();
    log::info!("Shape info:");
    log::info!("  Version: {}", shape.version);
    log::info!("  Radius: {} (tube {})", shape.radius, shape.tube_radius);
    log::info!("  Center: {:?}", shape.center);
    log::info!("  Bounds: {:?} - {:?}", shape.bounds.min, shape.bounds.max);
    log::info!(
        "  Nodes: {}, objects: {}, decals: {}, meshes: {}",
        stats.nodes,
        stats.objects,
        stats.decals,
        stats.meshes
    );
    log::info!(
        "  Rotations: {}, translations: {}, scales: {}/{}/{}, ground frames: {}",
        stats.node_rotations,
        stats.node_translations,
        stats.node_scales_uniform,
        stats.node_scales_aligned,
        stats.node_scales_arbitrary,
        stats.ground_frames
    );
    log::info!(
        "  Object states: {}, decal states: {}, triggers: {}, IFL materials: {}",
        stats.object_states,
        stats.decal_states,
        stats.triggers,
        stats.ifl_materials
    );

    log::info!("Nodes:");
    for line in hierarchy_lines(shape) {
        log::info!("{line}");
    }

    log::info!("Objects:");
    for (i, object) in shape.objects.iter().enumerate() {
        log::info!(
            "  {}: {} on node {}, meshes {}..{}",
            i,
            shape.object_name(i as i32),
            shape.node_name(object.node),
            object.first_mesh,
            object.first_mesh.saturating_add(object.num_meshes)
        );
    }

    log::info!("Subshapes:");
    for (i, subshape) in shape.subshapes.iter().enumerate() {
        log::info!(
            "  {}: nodes {:?}, objects {:?}, decals {:?}",
            i,
            subshape.node_range(),
            subshape.object_range(),
            subshape.decal_range()
        );
    }

    log::info!("Detail levels:");
    for detail in &shape.detail_levels {
        log::info!(
            "  {}: size {}, subshape {}, {} polys",
            shape.name(detail.name),
            detail.size,
            detail.subshape,
            detail.poly_count
        );
    }

    log::info!("Sequences:");
    for sequence in &shape.sequences {
        log_sequence(sequence, &shape.names);
    }

    log::info!("Materials:");
    for material in &shape.materials {
        log::info!(
            "  {} ({:#X}): {}",
            material.stem(),
            material.flags,
            resolver.resolve(&material.name).display()
        );
    }
}

/// Renders the node forest depth first, children indented under their parent.
fn hierarchy_lines(shape: &ShapeModel) -> Vec<String> {
    let mut children = vec![Vec::new(); shape.nodes.len()];
    for (i, node) in shape.nodes.iter().enumerate() {
        if let Some(list) = usize::try_from(node.parent).ok().and_then(|p| children.get_mut(p)) {
            list.push(i);
        }
    }
    let mut lines = Vec::new();
    let mut stack: Vec<(usize, usize)> = shape.root_nodes().map(|node| (node, 1)).collect();
    stack.reverse();
    while let Some((node, depth)) = stack.pop() {
        let linked = if shape.node_is_linked_to_object(node as i32) { " [object]" } else { "" };
        lines.push(format!(
            "{:indent$}{}{}",
            "",
            shape.node_name(node as i32),
            linked,
            indent = depth * 2
        ));
        stack.extend(children[node].iter().rev().map(|&child| (child, depth + 1)));
    }
    lines
}

fn log_sequence(sequence: &Sequence, names: &[String]) {
    log::info!(
        "  {}: {} key frames, {}s, {} rotations, {} translations, {} triggers",
        sequence.name(names).unwrap_or("(invalid)"),
        sequence.num_key_frames,
        sequence.duration,
        sequence.matters.rotation.count_ones(),
        sequence.matters.translation.count_ones(),
        sequence.num_triggers
    );
}

fn sequence_file_info(file: &SequenceFile) {
    log::info!("Sequence file info:");
    log::info!("  Version: {}", file.version);
    log::info!("  Nodes: {}", file.names.join(", "));
    log::info!(
        "  Rotations: {}, translations: {}, ground frames: {}, triggers: {}",
        file.node_rotations.len(),
        file.node_translations.len(),
        file.ground_translations.len(),
        file.triggers.len()
    );
    log::info!("Sequences:");
    for sequence in &file.sequences {
        log_sequence(sequence, &file.names);
    }
}
