use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::theme::ThemeColor;

/// Stat value that fills a panel bar completely.
pub const STAT_BAR_MAX: u32 = 1200;

/// One selectable character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    pub id: String,
    pub display_name: String,
    pub model_path: String,
    pub theme_color: ThemeColor,
    /// The model is expected to carry an animation clip.
    #[serde(default)]
    pub has_animation_hint: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<EntityProfile>,
}

impl EntityDescriptor {
    /// Three letter tag for roster buttons: the start of the real name's
    /// second word, or of the id when there is none.
    pub fn roster_tag(&self) -> String {
        let source = self
            .profile
            .as_ref()
            .and_then(|profile| profile.real_name.split_whitespace().nth(1))
            .unwrap_or(&self.id);
        source.chars().take(3).collect::<String>().to_uppercase()
    }
}

/// Panel data shown next to the model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityProfile {
    pub real_name: String,
    pub company: String,
    pub class: String,
    pub stats: Vec<Stat>,
    pub skills: Vec<Skill>,
    pub ultimate: Option<Skill>,
    pub quote: String,
}

impl EntityProfile {
    pub fn total_power(&self) -> u32 {
        self.stats.iter().map(|stat| stat.value).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stat {
    pub name: String,
    pub value: u32,
}

impl Stat {
    pub fn fill_percent(&self) -> f32 {
        stat_fill_percent(self.value)
    }
}

/// Width of a stat bar in percent, capped at 100.
pub fn stat_fill_percent(value: u32) -> f32 {
    (value as f32 / STAT_BAR_MAX as f32 * 100.0).min(100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Ordered list of selectable characters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Roster {
    entities: Vec<EntityDescriptor>,
}

impl Roster {
    pub fn new(entities: Vec<EntityDescriptor>) -> Self {
        Self { entities }
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&EntityDescriptor> {
        self.entities.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities.iter()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.entities.iter().position(|entity| entity.id == id)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let xml = fs::read_to_string(path)
            .with_context(|| format!("unable to read roster {}", path.display()))?;
        Self::from_xml(&xml).with_context(|| format!("in {}", path.display()))
    }

    /// Parses `<roster>` documents with one `<character>` per entity.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid roster XML")?;
        let mut entities = Vec::new();

        for node in document
            .descendants()
            .filter(|node| node.has_tag_name("character"))
        {
            let id = node
                .attribute("id")
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| anyhow!("<character> is missing an id attribute"))?
                .to_string();
            let entity = parse_character(&node, id.clone())
                .with_context(|| format!("in character `{id}`"))?;
            if entities
                .iter()
                .any(|existing: &EntityDescriptor| existing.id == entity.id)
            {
                return Err(anyhow!("duplicate character id `{id}`"));
            }
            entities.push(entity);
        }

        if entities.is_empty() {
            return Err(anyhow!("roster does not define any characters"));
        }
        Ok(Self { entities })
    }

    /// The six characters shipped with the viewer.
    pub fn builtin() -> Self {
        let entities = vec![
            builtin_entity(
                ("oracle", "THE ORACLE", "./models/oracle-altman.glb", 0x4A9EFF),
                ("Sam Altman", "OpenAI", "SUMMONER"),
                [900, 750, 600, 500, 1000],
                [
                    ("GPT Burst", "Rapid-fire knowledge beam"),
                    ("Alignment Field", "Slows enemies in radius"),
                ],
                ("AGI ASCENSION", "All stats doubled for 10s"),
                "The future belongs to those who build it.",
            ),
            builtin_entity(
                ("disruptor", "THE DISRUPTOR", "./models/disruptor-musk.glb", 0xFF3333),
                ("Elon Musk", "xAI / Tesla / SpaceX", "BERSERKER"),
                [1100, 950, 500, 800, 700],
                [
                    ("Rocket Punch", "Massive single-target hit"),
                    ("Tweet Storm", "AOE, confuses allies too"),
                ],
                ("FULL SELF DRIVING", "Autonomous attacks for 8s"),
                "When something is important enough, you do it.",
            ),
            builtin_entity(
                ("guardian", "THE GUARDIAN", "./models/guardian-amodei.glb", 0xFFB800),
                ("Dario Amodei", "Anthropic", "PALADIN"),
                [1200, 600, 1000, 450, 900],
                [
                    ("Constitutional Shield", "Blocks incoming damage"),
                    ("Safety Pulse", "Heals + cleanses team"),
                ],
                ("RESPONSIBLE SCALING", "Invulnerable, reflects dmg 12s"),
                "Safety through strength.",
            ),
            builtin_entity(
                ("architect", "THE ARCHITECT", "./models/architect-huang.glb", 0x76B900),
                ("Jensen Huang", "NVIDIA", "ENGINEER"),
                [950, 850, 700, 600, 950],
                [
                    ("CUDA Cores", "Multi-hit parallel attack"),
                    ("Leather Jacket Shield", "Armor buff + style points"),
                ],
                ("GPU SINGULARITY", "Overclocks reality, slows enemies"),
                "The more you buy, the more you save.",
            ),
            builtin_entity(
                ("worldbuilder", "WORLD BUILDER", "./models/worldbuilder-zuck.glb", 0x0866FF),
                ("Mark Zuckerberg", "Meta", "ILLUSIONIST"),
                [1000, 700, 650, 900, 800],
                [
                    ("Reality Shift", "Teleport behind enemy"),
                    ("Data Harvest", "Steal enemy buffs"),
                ],
                ("METAVERSE COLLAPSE", "Traps enemies in VR prison"),
                "Move fast and break things.",
            ),
            builtin_entity(
                ("overseer", "THE OVERSEER", "./models/overseer-pichai.glb", 0x34A853),
                ("Sundar Pichai", "Google / Alphabet", "CONTROLLER"),
                [1000, 700, 750, 550, 1000],
                [
                    ("Search & Destroy", "Homing projectile, never misses"),
                    ("DeepMind Link", "Predicts next 3 enemy moves"),
                ],
                ("GOOGLE CLOUD", "Rains data beams from above"),
                "Focus on the user and all else will follow.",
            ),
        ];
        Self { entities }
    }
}

const BUILTIN_STATS: [&str; 5] = ["HP", "ATK", "DEF", "SPD", "INT"];

fn builtin_entity(
    (id, name, model, rgb): (&str, &str, &str, u32),
    (real_name, company, class): (&str, &str, &str),
    stats: [u32; 5],
    skills: [(&str, &str); 2],
    ultimate: (&str, &str),
    quote: &str,
) -> EntityDescriptor {
    let skill = |(name, description): (&str, &str)| Skill {
        name: name.to_string(),
        description: description.to_string(),
        icon: None,
    };
    EntityDescriptor {
        id: id.to_string(),
        display_name: name.to_string(),
        model_path: model.to_string(),
        theme_color: ThemeColor::new((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8),
        has_animation_hint: false,
        profile: Some(EntityProfile {
            real_name: real_name.to_string(),
            company: company.to_string(),
            class: class.to_string(),
            stats: BUILTIN_STATS
                .iter()
                .zip(stats)
                .map(|(name, value)| Stat {
                    name: name.to_string(),
                    value,
                })
                .collect(),
            skills: skills.into_iter().map(skill).collect(),
            ultimate: Some(skill(ultimate)),
            quote: quote.to_string(),
        }),
    }
}

fn parse_character(node: &Node<'_, '_>, id: String) -> Result<EntityDescriptor> {
    let theme_color = ThemeColor::from_hex(&required_text(node, "theme")?)?;
    let has_animation_hint = match node.attribute("animated") {
        Some(value) => parse_bool(value)?,
        None => false,
    };
    let profile = node
        .children()
        .find(|child| child.has_tag_name("profile"))
        .map(|profile| parse_profile(&profile))
        .transpose()?;
    Ok(EntityDescriptor {
        display_name: required_text(node, "name")?,
        model_path: required_text(node, "model")?,
        theme_color,
        has_animation_hint,
        profile,
        id,
    })
}

fn parse_profile(node: &Node<'_, '_>) -> Result<EntityProfile> {
    let mut profile = EntityProfile {
        real_name: optional_text(node, "real-name").unwrap_or_default(),
        company: optional_text(node, "company").unwrap_or_default(),
        class: optional_text(node, "class").unwrap_or_default(),
        quote: optional_text(node, "quote").unwrap_or_default(),
        ..EntityProfile::default()
    };
    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "stat" => {
                let name = required_attribute(&child, "name")?;
                let value = required_attribute(&child, "value")?;
                let value = value
                    .parse::<u32>()
                    .with_context(|| format!("invalid value for stat {name}"))?;
                profile.stats.push(Stat { name, value });
            }
            "skill" => profile.skills.push(parse_skill(&child)?),
            "ultimate" => profile.ultimate = Some(parse_skill(&child)?),
            _ => {}
        }
    }
    Ok(profile)
}

fn parse_skill(node: &Node<'_, '_>) -> Result<Skill> {
    Ok(Skill {
        name: required_attribute(node, "name")?,
        description: node.text().map(str::trim).unwrap_or_default().to_string(),
        icon: node.attribute("icon").map(str::to_string),
    })
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        other => Err(anyhow!("expected a boolean, found `{other}`")),
    }
}

fn required_attribute(node: &Node<'_, '_>, name: &str) -> Result<String> {
    node.attribute(name)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("<{}> is missing the {name} attribute", node.tag_name().name()))
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
    <roster>
        <character id="knight" animated="true">
            <name>THE KNIGHT</name>
            <model>./models/knight.glb</model>
            <theme>#AA0000</theme>
            <profile>
                <real-name>Ser Galahad Pure</real-name>
                <company>Round Table</company>
                <class>PALADIN</class>
                <stat name="HP" value="1300"/>
                <stat name="ATK" value="600"/>
                <skill name="Shield Wall" icon="S">Blocks a volley</skill>
                <ultimate name="GRAIL">Heals everyone</ultimate>
                <quote>For the realm.</quote>
            </profile>
        </character>
        <character id="squire">
            <name>SQUIRE</name>
            <model>squire.obj</model>
            <theme>00AA00</theme>
        </character>
    </roster>
    "##;

    #[test]
    fn parses_characters_and_profiles() {
        let roster = Roster::from_xml(SAMPLE).unwrap();
        assert_eq!(roster.len(), 2);
        let knight = roster.get(0).unwrap();
        assert_eq!(knight.display_name, "THE KNIGHT");
        assert!(knight.has_animation_hint);
        assert_eq!(knight.theme_color, ThemeColor::new(0xAA, 0, 0));
        let profile = knight.profile.as_ref().unwrap();
        assert_eq!(profile.total_power(), 1900);
        assert_eq!(profile.stats[0].fill_percent(), 100.0);
        assert_eq!(profile.skills[0].description, "Blocks a volley");
        assert_eq!(profile.skills[0].icon.as_deref(), Some("S"));
        assert_eq!(profile.ultimate.as_ref().unwrap().name, "GRAIL");

        let squire = roster.get(1).unwrap();
        assert!(!squire.has_animation_hint);
        assert!(squire.profile.is_none());
        assert_eq!(roster.position("squire"), Some(1));
    }

    #[test]
    fn roster_tags_use_the_second_name() {
        let roster = Roster::from_xml(SAMPLE).unwrap();
        assert_eq!(roster.get(0).unwrap().roster_tag(), "GAL");
        assert_eq!(roster.get(1).unwrap().roster_tag(), "SQU");
    }

    #[test]
    fn rejects_bad_documents() {
        assert!(Roster::from_xml("<roster/>").is_err());
        assert!(Roster::from_xml("<roster><character><name>x</name></character></roster>").is_err());
        let bad_theme = r#"<roster><character id="a"><name>A</name><model>a.glb</model><theme>#12</theme></character></roster>"#;
        assert!(Roster::from_xml(bad_theme).is_err());
        let duplicate = r#"<roster>
            <character id="a"><name>A</name><model>a.glb</model><theme>#111111</theme></character>
            <character id="a"><name>B</name><model>b.glb</model><theme>#222222</theme></character>
        </roster>"#;
        assert!(Roster::from_xml(duplicate).is_err());
    }

    #[test]
    fn builtin_roster_has_six_themed_entities() {
        let roster = Roster::builtin();
        assert_eq!(roster.len(), 6);
        let oracle = roster.get(0).unwrap();
        assert_eq!(oracle.theme_color.to_hex(), "#4A9EFF");
        assert_eq!(oracle.model_path, "./models/oracle-altman.glb");
        assert_eq!(oracle.roster_tag(), "ALT");
        assert_eq!(oracle.profile.as_ref().unwrap().total_power(), 3750);
        assert_eq!(roster.get(4).unwrap().display_name, "WORLD BUILDER");
        assert_eq!(roster.get(5).unwrap().theme_color.to_hex(), "#34A853");
    }

    #[test]
    fn fill_percent_is_capped() {
        assert_eq!(stat_fill_percent(600), 50.0);
        assert_eq!(stat_fill_percent(5000), 100.0);
        assert_eq!(stat_fill_percent(0), 0.0);
    }
}
