use glam::{Quat, Vec3};

use crate::scene_graph::{Node, NodePath};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
}

/// Keyframe values for one animated transform property.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValues {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<Vec3>),
}

impl ChannelValues {
    pub fn len(&self) -> usize {
        match self {
            ChannelValues::Translation(values) | ChannelValues::Scale(values) => values.len(),
            ChannelValues::Rotation(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Keyframed property of the node at `target`, relative to the clip's root.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub target: NodePath,
    pub interpolation: Interpolation,
    /// Ascending keyframe times in seconds.
    pub times: Vec<f32>,
    pub values: ChannelValues,
}

impl Channel {
    fn apply(&self, time: f32, root: &mut Node) {
        if self.times.is_empty() || self.values.len() != self.times.len() {
            return;
        }
        let Some(node) = root.descendant_mut(&self.target) else {
            return;
        };
        let (from, to, t) = keyframe_span(&self.times, time);
        let t = match self.interpolation {
            Interpolation::Step => 0.0,
            Interpolation::Linear => t,
        };
        match &self.values {
            ChannelValues::Translation(values) => {
                node.transform.translation = values[from].lerp(values[to], t);
            }
            ChannelValues::Scale(values) => {
                node.transform.scale = values[from].lerp(values[to], t);
            }
            ChannelValues::Rotation(values) => {
                node.transform.rotation = values[from].slerp(values[to], t).normalize();
            }
        }
    }
}

/// True when every keyframe time is finite and none goes backwards.
pub fn keyframes_are_ordered(times: &[f32]) -> bool {
    times.iter().all(|time| time.is_finite()) && times.windows(2).all(|pair| pair[0] <= pair[1])
}

/// Keyframe pair surrounding `time` and the blend factor between them.
///
/// Unordered or non-finite keyframes still yield indices within `times`.
fn keyframe_span(times: &[f32], time: f32) -> (usize, usize, f32) {
    let last = times.len() - 1;
    if last == 0 || time <= times[0] {
        return (0, 0, 0.0);
    }
    if time >= times[last] {
        return (last, last, 0.0);
    }
    let next = times
        .partition_point(|&keyframe| keyframe <= time)
        .clamp(1, last);
    let previous = next - 1;
    let span = times[next] - times[previous];
    let t = if span > f32::EPSILON {
        ((time - times[previous]) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (previous, next, t)
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    /// Builds a clip whose duration is the latest keyframe of any channel.
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .filter_map(|channel| channel.times.last().copied())
            .filter(|time| time.is_finite())
            .fold(0.0_f32, f32::max);
        Self {
            name: name.into(),
            duration,
            channels,
        }
    }
}

/// Looping playback of a single clip over a model's node tree.
#[derive(Debug, Clone)]
pub struct AnimationController {
    clip: AnimationClip,
    time: f32,
}

impl AnimationController {
    /// Plays the first clip; the remaining clips are ignored.
    pub fn from_clips(clips: &[AnimationClip]) -> Option<Self> {
        clips.first().cloned().map(Self::new)
    }

    pub fn new(clip: AnimationClip) -> Self {
        Self { clip, time: 0.0 }
    }

    pub fn clip_name(&self) -> &str {
        &self.clip.name
    }

    /// Playhead position within the clip, in seconds.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Moves the playhead by `delta` seconds, wrapping at the clip end, and
    /// poses `root`.
    pub fn advance(&mut self, delta: f32, root: &mut Node) {
        let delta = if delta.is_finite() { delta.max(0.0) } else { 0.0 };
        self.time = if self.clip.duration > 0.0 {
            (self.time + delta).rem_euclid(self.clip.duration)
        } else {
            0.0
        };
        for channel in &self.clip.channels {
            channel.apply(self.time, root);
        }
    }
}
