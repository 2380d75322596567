// Scene kinds, device kinds and the built-in scene catalog

use crate::core::errors::QhseError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneType {
    Training,
    Inspection,
    Simulation,
    Guidance,
    Emergency,
}

impl SceneType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneType::Training => "training",
            SceneType::Inspection => "inspection",
            SceneType::Simulation => "simulation",
            SceneType::Guidance => "guidance",
            SceneType::Emergency => "emergency",
        }
    }
}

impl FromStr for SceneType {
    type Err = QhseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "training" => Ok(SceneType::Training),
            "inspection" => Ok(SceneType::Inspection),
            "simulation" => Ok(SceneType::Simulation),
            "guidance" => Ok(SceneType::Guidance),
            "emergency" => Ok(SceneType::Emergency),
            other => Err(QhseError::Validation(format!("Unknown scene type '{}'", other))),
        }
    }
}

impl fmt::Display for SceneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    MobileAr,
    VrHeadset,
    Hololens,
    Tablet,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::MobileAr => "mobile_ar",
            DeviceType::VrHeadset => "vr_headset",
            DeviceType::Hololens => "hololens",
            DeviceType::Tablet => "tablet",
        }
    }
}

impl FromStr for DeviceType {
    type Err = QhseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mobile_ar" => Ok(DeviceType::MobileAr),
            "vr_headset" => Ok(DeviceType::VrHeadset),
            "hololens" => Ok(DeviceType::Hololens),
            "tablet" => Ok(DeviceType::Tablet),
            other => Err(QhseError::Validation(format!("Unknown device type '{}'", other))),
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scene definition before it is stored
pub struct SceneDefinition {
    pub scene_id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub scene_type: SceneType,
    pub device_type: DeviceType,
    pub duration_minutes: i64,
    pub difficulty_level: i64,
    pub content: Value,
}

pub fn default_scenes() -> Vec<SceneDefinition> {
    vec![
        SceneDefinition {
            scene_id: "safety_training_1",
            name: "Formation Sécurité - Équipements de Protection",
            description: "Apprentissage des EPI en réalité virtuelle",
            scene_type: SceneType::Training,
            device_type: DeviceType::VrHeadset,
            duration_minutes: 30,
            difficulty_level: 2,
            content: safety_training_content(),
        },
        SceneDefinition {
            scene_id: "inspection_ar_1",
            name: "Inspection AR - Zone de Production",
            description: "Inspection assistée par réalité augmentée",
            scene_type: SceneType::Inspection,
            device_type: DeviceType::MobileAr,
            duration_minutes: 45,
            difficulty_level: 3,
            content: inspection_content(),
        },
        SceneDefinition {
            scene_id: "emergency_simulation_1",
            name: "Simulation d'Évacuation d'Urgence",
            description: "Simulation d'évacuation en cas d'incendie",
            scene_type: SceneType::Simulation,
            device_type: DeviceType::VrHeadset,
            duration_minutes: 20,
            difficulty_level: 4,
            content: evacuation_content(),
        },
        SceneDefinition {
            scene_id: "equipment_guidance_1",
            name: "Guide d'Utilisation - Machine Complexe",
            description: "Instructions pas à pas pour utiliser une machine",
            scene_type: SceneType::Guidance,
            device_type: DeviceType::Hololens,
            duration_minutes: 15,
            difficulty_level: 2,
            content: equipment_guidance_content(),
        },
    ]
}

fn safety_training_content() -> Value {
    json!({
        "environment": {
            "type": "industrial_workshop",
            "lighting": "bright",
            "ambient_sounds": ["machinery", "safety_alerts"]
        },
        "objects": [
            {
                "id": "helmet_1",
                "type": "safety_helmet",
                "position": {"x": 0, "y": 1.5, "z": 0},
                "interactive": true,
                "instructions": "Placez le casque de sécurité sur votre tête",
                "points": 10
            },
            {
                "id": "gloves_1",
                "type": "safety_gloves",
                "position": {"x": 1, "y": 1, "z": 0},
                "interactive": true,
                "instructions": "Enfilez les gants de protection",
                "points": 10
            },
            {
                "id": "safety_glasses_1",
                "type": "safety_glasses",
                "position": {"x": -1, "y": 1.2, "z": 0},
                "interactive": true,
                "instructions": "Mettez les lunettes de sécurité",
                "points": 10
            }
        ],
        "hazards": [
            {
                "id": "hazard_1",
                "type": "falling_object",
                "position": {"x": 2, "y": 3, "z": 1},
                "warning": "Attention aux objets qui tombent !",
                "prevention": "Portez toujours un casque de sécurité"
            }
        ],
        "checkpoints": [
            {
                "id": "checkpoint_1",
                "position": {"x": 0, "y": 0, "z": 2},
                "description": "Vérifiez votre équipement de protection",
                "required_objects": ["helmet_1", "gloves_1", "safety_glasses_1"]
            }
        ]
    })
}

fn inspection_content() -> Value {
    json!({
        "environment": {
            "type": "production_floor",
            "ar_markers": ["machine_1", "safety_zone_1", "emergency_exit_1"]
        },
        "inspection_points": [
            {
                "id": "inspection_1",
                "name": "Vérification des protections machine",
                "position": {"x": 0, "y": 0, "z": 0},
                "ar_overlay": "safety_check_overlay",
                "checklist": [
                    "Protections en place",
                    "Boutons d'arrêt d'urgence accessibles",
                    "Signalisation visible"
                ]
            },
            {
                "id": "inspection_2",
                "name": "Contrôle des extincteurs",
                "position": {"x": 5, "y": 0, "z": 0},
                "ar_overlay": "fire_safety_overlay",
                "checklist": [
                    "Extincteur en place",
                    "Pression correcte",
                    "Date de péremption valide"
                ]
            }
        ],
        "ar_objects": [
            {
                "id": "safety_info_1",
                "type": "info_panel",
                "position": {"x": 0, "y": 2, "z": 0},
                "content": "Zone de sécurité - Portez vos EPI"
            }
        ]
    })
}

fn evacuation_content() -> Value {
    json!({
        "environment": {
            "type": "office_building",
            "lighting": "emergency_red",
            "ambient_sounds": ["fire_alarm", "evacuation_instructions"]
        },
        "scenario": {
            "type": "fire_evacuation",
            "time_limit": 300,
            "objectives": [
                "Identifier les sorties de secours",
                "Suivre le plan d'évacuation",
                "Aider les collègues en difficulté"
            ]
        },
        "evacuation_route": [
            {"position": {"x": 0, "y": 0, "z": 0}, "instruction": "Sortez de votre bureau"},
            {"position": {"x": 5, "y": 0, "z": 0}, "instruction": "Dirigez-vous vers l'escalier de secours"},
            {"position": {"x": 10, "y": 0, "z": 0}, "instruction": "Descendez au rez-de-chaussée"},
            {"position": {"x": 15, "y": 0, "z": 0}, "instruction": "Sortez du bâtiment"}
        ],
        "hazards": [
            {
                "id": "smoke_1",
                "position": {"x": 3, "y": 1, "z": 0},
                "effect": "reduced_visibility",
                "avoidance_required": true
            }
        ]
    })
}

fn equipment_guidance_content() -> Value {
    json!({
        "equipment": {
            "name": "Presse Hydraulique",
            "model": "PH-5000",
            "safety_level": "high"
        },
        "steps": [
            {
                "step": 1,
                "instruction": "Vérifiez que la zone est dégagée",
                "ar_highlight": {"x": 0, "y": 0, "z": 0},
                "duration": 30
            },
            {
                "step": 2,
                "instruction": "Portez vos équipements de protection",
                "ar_highlight": {"x": 0, "y": 1.5, "z": 0},
                "duration": 60
            },
            {
                "step": 3,
                "instruction": "Activez le bouton de démarrage",
                "ar_highlight": {"x": 1, "y": 1, "z": 0},
                "duration": 15
            }
        ],
        "safety_checks": [
            "Vérification des protections",
            "Contrôle des boutons d'arrêt",
            "Test de fonctionnement"
        ]
    })
}
