use std::{f32::consts::FRAC_PI_4, io::Cursor};

use glam::{Mat4, Quat, Vec3};
use skinning_asset::{
    animation::{AnimationClip, AnimationTrack, Keyframe},
    material::{MaterialAsset, MaterialTexture, TextureUsage},
    mesh::{BoneVertexWeights, MeshAsset},
    model::{Model, ModelData},
    node::SceneNode,
};

fn sample_model() -> Model {
    let mut data = ModelData::default();
    data.materials.push(MaterialAsset {
        name: String::from("body"),
        textures: vec![
            MaterialTexture {
                usage: TextureUsage::Diffuse,
                path: String::from("textures/body.png"),
            },
            MaterialTexture {
                usage: TextureUsage::NormalMap,
                path: String::from("textures/body_n.png"),
            },
        ],
    });

    let hips = data
        .add_bone(
            "hips",
            Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0)),
            Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)),
        )
        .unwrap();
    let spine = data
        .add_bone(
            "spine",
            Mat4::from_rotation_z(FRAC_PI_4),
            Mat4::from_translation(Vec3::new(0.0, -1.5, 0.0)),
        )
        .unwrap();
    let hips_id = data.bones[hips as usize];
    let spine_id = data.bones[spine as usize];

    let root = data.scene_graph.add_node(SceneNode::joint(
        "armature",
        Mat4::from_scale(Vec3::splat(0.01)),
    ));
    let prop = data.scene_graph.add_node(SceneNode::joint(
        "prop",
        Mat4::from_translation(Vec3::new(0.5, 0.0, 0.0)),
    ));
    data.scene_graph.add_child(root, hips_id).unwrap();
    data.scene_graph.add_child(hips_id, spine_id).unwrap();
    data.scene_graph.add_child(hips_id, prop).unwrap();
    data.scene_graph.set_root(root).unwrap();

    let mut first = BoneVertexWeights::default();
    first.add_weight(0.75, hips).unwrap();
    first.add_weight(0.25, spine).unwrap();
    let mut second = BoneVertexWeights::default();
    second.add_weight(1.0, spine).unwrap();
    let mut third = BoneVertexWeights::default();
    third.add_weight(1.0, hips).unwrap();
    data.meshes.push(MeshAsset {
        name: String::from("torso"),
        material_index: 0,
        positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        normals: vec![[0.0, 0.0, 1.0]; 3],
        tangents: vec![[1.0, 0.0, 0.0]; 3],
        binormals: vec![[0.0, 1.0, 0.0]; 3],
        tex_coords: vec![vec![[0.0, 1.0, 0.0], [1.0, 1.0, 0.0], [0.0, 0.0, 0.0]]],
        colors: vec![vec![[1.0, 0.5, 0.25, 1.0]; 3]],
        face_count: 1,
        indices: vec![0, 1, 2],
        bone_weights: vec![first, second, third],
    });

    let wave = AnimationTrack::new(
        spine,
        vec![
            Keyframe::new(0.0, Vec3::ZERO, Quat::IDENTITY, Vec3::ONE),
            Keyframe::new(12.0, Vec3::ZERO, Quat::from_rotation_z(FRAC_PI_4), Vec3::ONE),
            Keyframe::new(24.0, Vec3::ZERO, Quat::IDENTITY, Vec3::splat(1.5)),
        ],
    )
    .unwrap();
    let bob = AnimationTrack::new(
        hips,
        vec![
            Keyframe::new(0.0, Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY, Vec3::ONE),
            Keyframe::new(24.0, Vec3::new(0.0, 0.8, 0.0), Quat::IDENTITY, Vec3::ONE),
        ],
    )
    .unwrap();
    data.clips
        .push(AnimationClip::new("wave", 24.0, 24.0, vec![wave, bob]).unwrap());
    data.clips
        .push(AnimationClip::new("idle", 0.0, 30.0, Vec::new()).unwrap());

    Model::new(data).unwrap()
}

fn save(model: &Model) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    model.save(&mut cursor).unwrap();
    cursor.into_inner()
}

#[test]
fn test_round_trip_preserves_model() {
    let model = sample_model();
    let bytes = save(&model);
    let loaded = Model::load(&mut Cursor::new(bytes.clone())).unwrap();

    assert_eq!(loaded.materials(), model.materials());
    assert_eq!(loaded.meshes(), model.meshes());

    assert_eq!(loaded.bone_count(), model.bone_count());
    for ((_, node, bone), (_, loaded_node, loaded_bone)) in model.bones().zip(loaded.bones()) {
        assert_eq!(loaded_node.name(), node.name());
        assert_eq!(loaded_node.transform(), node.transform());
        assert_eq!(loaded_bone, bone);
    }
    assert_eq!(loaded.bone_index("spine"), Some(1));

    let graph = model.scene_graph();
    let loaded_graph = loaded.scene_graph();
    let names: Vec<(&str, bool)> = graph
        .depth_first(model.root().unwrap())
        .map(|id| (graph[id].name(), graph[id].is_bone()))
        .collect();
    let loaded_names: Vec<(&str, bool)> = loaded_graph
        .depth_first(loaded.root().unwrap())
        .map(|id| (loaded_graph[id].name(), loaded_graph[id].is_bone()))
        .collect();
    assert_eq!(loaded_names, names);
    assert_eq!(
        loaded_names,
        [
            ("armature", false),
            ("hips", true),
            ("spine", true),
            ("prop", false)
        ]
    );
    let prop = loaded_graph.find_by_name("prop").unwrap();
    assert_eq!(
        *loaded_graph[prop].transform(),
        Mat4::from_translation(Vec3::new(0.5, 0.0, 0.0))
    );

    assert_eq!(loaded.clips().len(), 2);
    let wave = loaded.clip("wave").unwrap();
    let original = model.clip("wave").unwrap();
    assert_eq!(wave.duration(), original.duration());
    assert_eq!(wave.ticks_per_second(), original.ticks_per_second());
    assert_eq!(wave.keyframe_count(), 3);
    assert_eq!(wave.tracks(), original.tracks());
    let idle = loaded.clip("idle").unwrap();
    assert!(idle.tracks().is_empty());
    assert_eq!(loaded.clip_at(1).unwrap().name(), "idle");

    // Saving the loaded model reproduces the file
    assert_eq!(save(&loaded), bytes);
}

#[test]
fn test_round_trip_without_skeleton() {
    let model = Model::new(ModelData {
        materials: vec![MaterialAsset::new("plain")],
        ..Default::default()
    })
    .unwrap();
    let bytes = save(&model);
    let loaded = Model::load(&mut Cursor::new(bytes)).unwrap();
    assert!(!loaded.has_skeleton());
    assert!(!loaded.has_animations());
    assert_eq!(loaded.materials()[0].name, "plain");
}

#[test]
fn test_round_trip_file() {
    let model = sample_model();
    let path = std::env::temp_dir().join(format!("skinning-round-trip-{}.bin", std::process::id()));
    model.save_file(&path).unwrap();
    let loaded = Model::load_file(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(loaded.bone_count(), 2);
    assert_eq!(loaded.clips().len(), 2);
}

#[test]
fn test_empty_input() {
    assert!(Model::load(&mut Cursor::new(Vec::new())).is_err());
}
