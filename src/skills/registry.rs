//! Skill Registry
//!
//! Holds validated skill records handed over by discovery. Entries arrive in
//! priority order: the first record for a plain name wins, later ones stay
//! reachable only through their plugin-qualified name (`plugin:skill`).

use super::types::{SkillEntry, SkillMetadata};
use crate::error::{Result, SkillError};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct SkillRegistry {
    skills: HashMap<String, SkillEntry>,
    order: Vec<String>,
    plugin_skills: HashMap<String, HashMap<String, SkillEntry>>,
    plugin_order: Vec<String>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry; returns false if the plain name was already taken
    pub fn register(&mut self, entry: SkillEntry) -> bool {
        let name = entry.name().to_string();

        if let Some(plugin) = entry.plugin.clone() {
            if !self.plugin_skills.contains_key(&plugin) {
                self.plugin_order.push(plugin.clone());
            }
            self.plugin_skills
                .entry(plugin)
                .or_default()
                .insert(name.clone(), entry.clone());
        }

        if let Some(existing) = self.skills.get(&name) {
            warn!(
                "Skill '{}' at {} shadowed by higher-priority {}",
                name,
                entry.metadata.skill_path.display(),
                existing.metadata.skill_path.display()
            );
            return false;
        }

        debug!("Registered skill '{}'", name);
        self.order.push(name.clone());
        self.skills.insert(name, entry);
        true
    }

    /// Look up a plain (`skill`) or qualified (`plugin:skill`) name
    pub fn get(&self, name: &str) -> Result<&SkillEntry> {
        match name.split_once(':') {
            Some((plugin, skill)) if !plugin.is_empty() && !skill.is_empty() => {
                let Some(skills) = self.plugin_skills.get(plugin) else {
                    return Err(SkillError::SkillNotFound {
                        name: name.to_string(),
                        available: self.plugin_order.clone(),
                    });
                };
                skills.get(skill).ok_or_else(|| {
                    let mut available: Vec<String> = skills.keys().cloned().collect();
                    available.sort();
                    SkillError::SkillNotFound {
                        name: name.to_string(),
                        available,
                    }
                })
            }
            _ => self.skills.get(name).ok_or_else(|| SkillError::SkillNotFound {
                name: name.to_string(),
                available: self.order.clone(),
            }),
        }
    }

    /// Metadata for every plain-name skill, in registration order
    pub fn list(&self) -> Vec<SkillMetadata> {
        self.order
            .iter()
            .filter_map(|name| self.skills.get(name))
            .map(|entry| entry.metadata.clone())
            .collect()
    }

    /// Plain names, plus `plugin:skill` for plugin versions shadowed by a
    /// different skill under the same plain name
    pub fn names(&self, include_qualified: bool) -> Vec<String> {
        let mut names = self.order.clone();
        if !include_qualified {
            return names;
        }

        for plugin in &self.plugin_order {
            let Some(skills) = self.plugin_skills.get(plugin) else {
                continue;
            };
            let mut shadowed: Vec<&String> = skills
                .iter()
                .filter(|(skill, entry)| {
                    self.skills
                        .get(*skill)
                        .map(|main| main.metadata.skill_path != entry.metadata.skill_path)
                        .unwrap_or(false)
                })
                .map(|(skill, _)| skill)
                .collect();
            shadowed.sort();
            names.extend(shadowed.into_iter().map(|skill| format!("{}:{}", plugin, skill)));
        }
        names
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn clear(&mut self) {
        self.skills.clear();
        self.order.clear();
        self.plugin_skills.clear();
        self.plugin_order.clear();
    }
}
