// Keyword-driven safety chatbot

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatReply {
    pub response: String,
    pub risk_level: &'static str,
    pub quick_replies: Vec<String>,
}

struct Rule {
    keyword: &'static str,
    response: &'static str,
    risk_level: &'static str,
    quick_replies: [&'static str; 3],
}

static RULES: [Rule; 4] = [
    Rule {
        keyword: "incendie",
        response: "En cas d'incendie, suivez la procédure : 1) Activez l'alarme, 2) Évacuez immédiatement, 3) Composez le 18. Les extincteurs sont disponibles tous les 15m.",
        risk_level: "high",
        quick_replies: ["Où sont les extincteurs ?", "Plan d'évacuation", "Formation incendie"],
    },
    Rule {
        keyword: "bâtiment",
        response: "Pour le BTP, les EPI obligatoires sont : casque de sécurité, chaussures de sécurité, gants, harnais antichute (si hauteur >3m).",
        risk_level: "medium",
        quick_replies: ["Normes harnais", "EPI spécifiques électricité", "Contrôle EPI"],
    },
    Rule {
        keyword: "chimique",
        response: "La manipulation de produits chimiques nécessite : fiche de données sécurité, ventilation adaptée, EPI (gants, lunettes, masque).",
        risk_level: "high",
        quick_replies: ["FDS à consulter", "EPI chimiques", "Procédure déversement"],
    },
    Rule {
        keyword: "signal",
        response: "Pour signaler un incident : 1) Sécurisez la zone, 2) Aidez les blessés sans vous mettre en danger, 3) Appelez les secours si besoin.",
        risk_level: "medium",
        quick_replies: ["Ouvrir formulaire", "Procédure complète", "Numéros urgents"],
    },
];

static DEFAULT_RULE: Rule = Rule {
    keyword: "",
    response: "Je peux vous aider avec les réglementations QHSE, les procédures de sécurité, l'analyse de risques et plus. Posez-moi une question précise.",
    risk_level: "low",
    quick_replies: ["Réglementation actuelle", "Derniers incidents", "Formations disponibles"],
};

/// Answer a message with the first rule whose keyword it contains
pub fn reply(message: &str) -> ChatReply {
    let lowered = message.to_lowercase();
    let rule = RULES
        .iter()
        .find(|rule| lowered.contains(rule.keyword))
        .unwrap_or(&DEFAULT_RULE);

    ChatReply {
        response: rule.response.to_string(),
        risk_level: rule.risk_level,
        quick_replies: rule.quick_replies.iter().map(|s| s.to_string()).collect(),
    }
}
