//! Skeletal animation importer.
//!
//! Line-based text format, one directive per line, `#` starts a comment:
//!
//! ```text
//! bone root -
//! bone spine root
//! anim walk 1.0
//! key 0.0 spine 0 1 0  0 0 0 1
//! key 0.5 spine 0 1 0  0 0.7071 0 0.7071  1 1 1
//! ```
//!
//! `bone <name> <parent|->` declares a bone; parents must be declared first.
//! `anim <name> <duration>` opens a clip; following `key` lines belong to it.
//! `key <time> <bone> tx ty tz qx qy qz qw [sx sy sz]` adds a keyframe.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail};
use corelib::{Quat, Vec3, transform::Transform};

/// One node of the bone hierarchy.
#[derive(Clone, Debug, PartialEq)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Keyframe {
    pub time: f32,
    pub bone: usize,
    pub transform: Transform,
}

/// Named clip; keyframes are ordered by time, stable for equal times.
#[derive(Clone, Debug, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub keyframes: Vec<Keyframe>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimationData {
    pub bones: Vec<Bone>,
    pub clips: Vec<AnimationClip>,
}

impl AnimationData {
    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn children(&self, bone: usize) -> impl Iterator<Item = usize> + '_ {
        self.bones
            .iter()
            .enumerate()
            .filter(move |(_, b)| b.parent == Some(bone))
            .map(|(i, _)| i)
    }

    pub fn clip(&self, name: &str) -> Option<&AnimationClip> {
        self.clips.iter().find(|c| c.name == name)
    }
}

impl AnimationClip {
    /// Interpolated local transform of `bone` at `time`; identity if the bone has no keys.
    pub fn sample(&self, bone: usize, time: f32) -> Transform {
        let mut prev: Option<&Keyframe> = None;
        for key in self.keyframes.iter().filter(|k| k.bone == bone) {
            if key.time >= time {
                return match prev {
                    Some(p) if key.time > p.time => {
                        p.transform.lerp(&key.transform, (time - p.time) / (key.time - p.time))
                    }
                    _ => key.transform,
                };
            }
            prev = Some(key);
        }
        prev.map(|k| k.transform).unwrap_or_default()
    }
}

/// Import an animation file from a path.
pub fn load_animation_from_path(path: impl AsRef<Path>) -> Result<AnimationData> {
    let file = File::open(&path)
        .with_context(|| format!("Failed to open animation file: {}", path.as_ref().display()))?;
    parse_animation(BufReader::new(file))
}

pub fn load_animation_from_str(contents: &str) -> Result<AnimationData> {
    parse_animation(io::Cursor::new(contents))
}

fn parse_animation<R: BufRead>(reader: R) -> Result<AnimationData> {
    let mut data = AnimationData::default();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_no + 1))?;
        let trimmed = line.split('#').next().unwrap_or("").trim();
        if trimmed.is_empty() {
            continue;
        }

        let tokens: Vec<&str> = trimmed.split_whitespace().collect();
        match tokens[0] {
            "bone" => {
                let [_, name, parent] = tokens[..] else {
                    bail!("Expected 'bone <name> <parent|->' on line {}", line_no + 1);
                };
                if by_name.contains_key(name) {
                    bail!("Bone '{}' declared twice on line {}", name, line_no + 1);
                }
                let parent = match parent {
                    "-" => None,
                    p => Some(*by_name.get(p).ok_or_else(|| {
                        anyhow!("Unknown parent bone '{}' on line {}", p, line_no + 1)
                    })?),
                };
                by_name.insert(name.to_owned(), data.bones.len());
                data.bones.push(Bone {
                    name: name.to_owned(),
                    parent,
                });
            }
            "anim" => {
                let [_, name, duration] = tokens[..] else {
                    bail!("Expected 'anim <name> <duration>' on line {}", line_no + 1);
                };
                let duration = parse_f32(duration, line_no, "clip duration")?;
                if !duration.is_finite() || duration < 0.0 {
                    bail!("Invalid clip duration {} on line {}", duration, line_no + 1);
                }
                data.clips.push(AnimationClip {
                    name: name.to_owned(),
                    duration,
                    keyframes: Vec::new(),
                });
            }
            "key" => {
                if tokens.len() != 10 && tokens.len() != 13 {
                    bail!(
                        "Expected 'key <time> <bone> tx ty tz qx qy qz qw [sx sy sz]' on line {}",
                        line_no + 1
                    );
                }
                let clip = data
                    .clips
                    .last_mut()
                    .ok_or_else(|| anyhow!("Keyframe before any 'anim' on line {}", line_no + 1))?;
                let time = parse_f32(tokens[1], line_no, "key time")?;
                if !time.is_finite() || time < 0.0 || time > clip.duration {
                    bail!(
                        "Key time {} outside clip '{}' (0..{}) on line {}",
                        time,
                        clip.name,
                        clip.duration,
                        line_no + 1
                    );
                }
                let bone = *by_name
                    .get(tokens[2])
                    .ok_or_else(|| anyhow!("Unknown bone '{}' on line {}", tokens[2], line_no + 1))?;

                let mut values = [0.0f32; 10];
                for (slot, token) in values.iter_mut().zip(&tokens[3..]) {
                    *slot = parse_f32(token, line_no, "key component")?;
                }
                let scale = if tokens.len() == 13 {
                    Vec3::new(values[7], values[8], values[9])
                } else {
                    Vec3::ONE
                };
                let rotation = Quat::from_xyzw(values[3], values[4], values[5], values[6]);
                if rotation.length_squared() == 0.0 {
                    bail!("Zero-length rotation on line {}", line_no + 1);
                }
                clip.keyframes.push(Keyframe {
                    time,
                    bone,
                    transform: Transform::from_trs(
                        Vec3::new(values[0], values[1], values[2]),
                        rotation,
                        scale,
                    ),
                });
            }
            other => bail!("Unknown directive '{}' on line {}", other, line_no + 1),
        }
    }

    if data.bones.is_empty() {
        bail!("Animation declares no bones");
    }
    for clip in &mut data.clips {
        clip.keyframes.sort_by(|a, b| a.time.total_cmp(&b.time));
    }

    Ok(data)
}

fn parse_f32(token: &str, line_no: usize, what: &str) -> Result<f32> {
    token
        .parse::<f32>()
        .with_context(|| format!("Failed to parse {} on line {}", what, line_no + 1))
}
