//! VRM avatar rig parsed with the `gltf` crate.
//!
//! The rig exposes exactly what the tracking applier drives: the VRM humanoid
//! bone map with per-node local rotations, and the expression preset table.
//! Mesh geometry, materials and textures are never touched, so only the glTF
//! document (plus the raw VRM extension JSON) is parsed — buffers stay on
//! disk.

use std::collections::HashMap;

use glam::{Quat, Vec3};

use crate::error::AvatarError;

/// A loaded avatar: named-bone local rotations plus an expression-weight
/// table with an enumerable preset key space.
#[derive(Debug, Clone)]
pub struct AvatarRig {
    /// VRM humanoid bone name → node index
    bone_to_node: HashMap<String, usize>,
    /// Per-node local rotation (rest pose at load time)
    local_rotations: Vec<Quat>,
    /// Per-node local translation
    local_translations: Vec<Vec3>,
    /// Expression preset name → current weight in [0, 1]
    expression_weights: HashMap<String, f32>,
}

impl AvatarRig {
    /// Parse a rig from VRM/GLB bytes.
    ///
    /// The model is positioned at the origin: root node translations are
    /// zeroed so a freshly loaded avatar always appears at the same place.
    pub fn parse(bytes: &[u8]) -> Result<Self, AvatarError> {
        let gltf = gltf::Gltf::from_slice(bytes)
            .map_err(|e| AvatarError::Parse(format!("glTF parse failed: {}", e)))?;
        let document = gltf.document;

        let node_count = document.nodes().count();
        let mut local_rotations = Vec::with_capacity(node_count);
        let mut local_translations = Vec::with_capacity(node_count);
        for node in document.nodes() {
            let (t, r, _s) = node.transform().decomposed();
            local_translations.push(Vec3::from(t));
            local_rotations.push(Quat::from_array(r));
        }

        // Zero the translation of every root node
        let mut has_parent = vec![false; node_count];
        for node in document.nodes() {
            for child in node.children() {
                has_parent[child.index()] = true;
            }
        }
        for (idx, parented) in has_parent.iter().enumerate() {
            if !parented {
                local_translations[idx] = Vec3::ZERO;
            }
        }

        // VRM metadata lives in extension JSON the gltf crate doesn't model
        let root = parse_vrm_json(bytes)?;
        let bone_to_node = parse_humanoid_bones(&root);
        let expression_weights = parse_expression_presets(&root)
            .into_iter()
            .map(|name| (name, 0.0f32))
            .collect();

        Ok(Self {
            bone_to_node,
            local_rotations,
            local_translations,
            expression_weights,
        })
    }

    /// Whether the model carried a VRM humanoid bone map at all.
    pub fn has_humanoid(&self) -> bool {
        !self.bone_to_node.is_empty()
    }

    /// Local rotation of a humanoid bone, by VRM bone name.
    pub fn bone_local_rotation(&self, bone: &str) -> Option<Quat> {
        let &node = self.bone_to_node.get(bone)?;
        self.local_rotations.get(node).copied()
    }

    /// Set the local rotation of a humanoid bone. Returns false if the bone
    /// does not exist in this rig.
    pub fn set_bone_local_rotation(&mut self, bone: &str, rotation: Quat) -> bool {
        match self.bone_to_node.get(bone) {
            Some(&node) if node < self.local_rotations.len() => {
                self.local_rotations[node] = rotation;
                true
            }
            _ => false,
        }
    }

    /// Local translation of a humanoid bone, by VRM bone name.
    pub fn bone_local_translation(&self, bone: &str) -> Option<Vec3> {
        let &node = self.bone_to_node.get(bone)?;
        self.local_translations.get(node).copied()
    }

    /// Set an expression preset weight, clamped to [0, 1]. Writes to preset
    /// keys the model does not define are ignored.
    pub fn set_expression(&mut self, key: &str, weight: f32) {
        if let Some(w) = self.expression_weights.get_mut(key) {
            *w = weight.clamp(0.0, 1.0);
        }
    }

    /// Current weight of an expression preset.
    pub fn expression(&self, key: &str) -> Option<f32> {
        self.expression_weights.get(key).copied()
    }

    /// The model's expression preset key space.
    pub fn expression_keys(&self) -> impl Iterator<Item = &str> {
        self.expression_weights.keys().map(String::as_str)
    }

    /// Zero every expression weight.
    pub fn reset_expressions(&mut self) {
        for weight in self.expression_weights.values_mut() {
            *weight = 0.0;
        }
    }
}

/// Extract the glTF JSON from GLB bytes (or pass plain-JSON glTF through)
/// so the VRM extension blocks can be read.
///
/// GLB layout: 12-byte header (magic, version, length), then chunks of
/// (length u32, type u32, data). The first chunk is always JSON.
fn parse_vrm_json(bytes: &[u8]) -> Result<serde_json::Value, AvatarError> {
    let json_slice = if bytes.starts_with(b"glTF") {
        if bytes.len() < 20 {
            return Err(AvatarError::Parse("GLB header truncated".to_string()));
        }
        let json_length =
            u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
        if bytes.len() < 20 + json_length {
            return Err(AvatarError::Parse("GLB JSON chunk truncated".to_string()));
        }
        &bytes[20..20 + json_length]
    } else {
        bytes
    };

    serde_json::from_slice(json_slice)
        .map_err(|e| AvatarError::Parse(format!("JSON parse error: {}", e)))
}

/// Parse the VRM humanoid bone map: VRM 1.0 `VRMC_vrm` first, then the
/// VRM 0.x `VRM` extension as a fallback.
fn parse_humanoid_bones(root: &serde_json::Value) -> HashMap<String, usize> {
    let mut map = HashMap::new();

    if let Some(bones) = root
        .pointer("/extensions/VRMC_vrm/humanoid/humanBones")
        .and_then(|b| b.as_object())
    {
        for (bone_name, data) in bones {
            if let Some(node) = data.get("node").and_then(|n| n.as_u64()) {
                map.insert(bone_name.clone(), node as usize);
            }
        }
    }

    if map.is_empty() {
        if let Some(bones) = root
            .pointer("/extensions/VRM/humanoid/humanBones")
            .and_then(|b| b.as_array())
        {
            for bone in bones {
                if let (Some(name), Some(node)) = (
                    bone.get("bone").and_then(|b| b.as_str()),
                    bone.get("node").and_then(|n| n.as_u64()),
                ) {
                    // VRM 0.x uses PascalCase bone names
                    map.insert(lower_first(name), node as usize);
                }
            }
        }
    }

    map
}

/// Collect the expression preset key space: VRM 1.0 preset names, or VRM 0.x
/// blend shape group names translated to their 1.0 equivalents.
fn parse_expression_presets(root: &serde_json::Value) -> Vec<String> {
    if let Some(preset) = root
        .pointer("/extensions/VRMC_vrm/expressions/preset")
        .and_then(|p| p.as_object())
    {
        return preset.keys().cloned().collect();
    }

    let mut names = Vec::new();
    if let Some(groups) = root
        .pointer("/extensions/VRM/blendShapeMaster/blendShapeGroups")
        .and_then(|g| g.as_array())
    {
        for group in groups {
            let raw = group
                .get("presetName")
                .and_then(|n| n.as_str())
                .or_else(|| group.get("name").and_then(|n| n.as_str()));
            if let Some(raw) = raw {
                names.push(rename_0x_preset(&raw.to_lowercase()).to_string());
            }
        }
    }
    names
}

/// VRM 0.x preset names to their VRM 1.0 equivalents.
fn rename_0x_preset(name: &str) -> &str {
    match name {
        "a" => "aa",
        "i" => "ih",
        "u" => "ou",
        "e" => "ee",
        "o" => "oh",
        "blink_l" => "blinkLeft",
        "blink_r" => "blinkRight",
        "joy" => "happy",
        "sorrow" => "sad",
        "fun" => "relaxed",
        "lookup" => "lookUp",
        "lookdown" => "lookDown",
        "lookleft" => "lookLeft",
        "lookright" => "lookRight",
        other => other,
    }
}

/// "Head" → "head", "LeftUpperArm" → "leftUpperArm".
fn lower_first(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for (i, c) in s.chars().enumerate() {
        if i == 0 {
            result.extend(c.to_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}
