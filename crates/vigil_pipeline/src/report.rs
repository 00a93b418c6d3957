//! Report composition: one builder driven by a declarative section list.
//!
//! Presentation is an external collaborator; the core hands it this
//! context and consumes nothing back. Evolving the cosmetic layer means
//! editing the section list, never the pipeline.

use ioc_extract::{EnrichmentRecord, PrimaryVector};
use vigil_core::{ActorAssessment, IndicatorSet, IntelItem, RiskAssessment, TechniqueMatch};

pub struct ReportContext<'a> {
    pub items: &'a [IntelItem],
    pub indicators: &'a IndicatorSet,
    pub actor: &'a ActorAssessment,
    pub techniques: &'a [TechniqueMatch],
    pub risk: &'a RiskAssessment,
    pub vector: PrimaryVector,
    pub enrichment: &'a [(String, EnrichmentRecord)],
}

type SectionFn = fn(&ReportContext) -> String;

pub struct ReportBuilder {
    sections: Vec<(&'static str, SectionFn)>,
}

impl ReportBuilder {
    /// The standard daily report layout.
    pub fn standard() -> Self {
        Self {
            sections: vec![
                ("Executive Summary", section_summary),
                ("Risk Assessment", section_risk),
                ("Advisories", section_items),
                ("Indicators of Compromise", section_indicators),
                ("Attributed Activity", section_actor),
                ("Observed Techniques", section_techniques),
                ("Infrastructure Context", section_enrichment),
            ],
        }
    }

    pub fn build(&self, ctx: &ReportContext) -> String {
        let mut html = String::from("<article>\n");
        for (title, section) in &self.sections {
            let body = section(ctx);
            if body.is_empty() {
                continue;
            }
            html.push_str(&format!("<h2>{}</h2>\n{}\n", title, body));
        }
        html.push_str("</article>\n");
        html
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn section_summary(ctx: &ReportContext) -> String {
    format!(
        "<p>{} new advisories triaged. Primary vector: {}. Composite risk: {:.1}/10.0 ({}).</p>",
        ctx.items.len(),
        ctx.vector.as_str(),
        ctx.risk.score,
        ctx.risk.label.as_str()
    )
}

fn section_risk(ctx: &ReportContext) -> String {
    let factors = ctx
        .risk
        .contributing_factors
        .iter()
        .map(|f| format!("<li>{}</li>", escape(f)))
        .collect::<String>();
    format!("<ul>{}</ul>", factors)
}

fn section_items(ctx: &ReportContext) -> String {
    ctx.items
        .iter()
        .map(|item| {
            format!(
                "<p><strong>{}</strong> ({})<br/>{}</p>",
                escape(&item.title),
                escape(&item.source),
                escape(&item.summary)
            )
        })
        .collect()
}

fn section_indicators(ctx: &ReportContext) -> String {
    if ctx.indicators.is_empty() {
        return String::new();
    }
    ctx.indicators
        .iter()
        .map(|(kind, value)| format!("<li><code>{}</code>: {}</li>", kind.as_str(), escape(value)))
        .fold(String::from("<ul>"), |mut acc, li| {
            acc.push_str(&li);
            acc
        })
        + "</ul>"
}

fn section_actor(ctx: &ReportContext) -> String {
    format!(
        "<p>Tracking id <code>{}</code> ({}). Origin: {}. Motivation: {}. Confidence: {}.</p>",
        ctx.actor.tracking_id,
        escape(&ctx.actor.aliases.join(", ")),
        escape(&ctx.actor.origin),
        escape(&ctx.actor.motivation),
        ctx.actor.confidence.as_str()
    )
}

fn section_techniques(ctx: &ReportContext) -> String {
    if ctx.techniques.is_empty() {
        return String::new();
    }
    ctx.techniques
        .iter()
        .map(|t| {
            format!(
                "<li>{}: {} ({})</li>",
                t.technique_id,
                escape(&t.name),
                escape(&t.tactic)
            )
        })
        .fold(String::from("<ul>"), |mut acc, li| {
            acc.push_str(&li);
            acc
        })
        + "</ul>"
}

fn section_enrichment(ctx: &ReportContext) -> String {
    if ctx.enrichment.is_empty() {
        return String::new();
    }
    ctx.enrichment
        .iter()
        .map(|(ip, rec)| {
            format!(
                "<li>{}: {} / {}</li>",
                escape(ip),
                escape(&rec.location),
                escape(&rec.isp)
            )
        })
        .fold(String::from("<ul>"), |mut acc, li| {
            acc.push_str(&li);
            acc
        })
        + "</ul>"
}
