use anyhow::Result;
use shared::domain::{NewTemplateItem, SectionKind, Template};
use storage::Storage;
use tracing::info;

pub const SUNDAY_TEMPLATE_NAME: &str = "Culte Du Dimanche";
pub const SUNDAY_TEMPLATE_DESCRIPTION: &str = "Format standard hétérogène (08h15 - 11h10)";

/// The standard Sunday program, 175 minutes in total.
pub const SUNDAY_TEMPLATE_ITEMS: [(&str, i64, SectionKind); 10] = [
    ("ENTREE DE L'AUDITOIRE", 600, SectionKind::Generic),
    ("MODERATEUR CULTE (PRIERE D'OUVERTURE)", 600, SectionKind::Speech),
    ("LOUANGE ET ADORATION", 2700, SectionKind::Song),
    ("SAINTE CENE", 600, SectionKind::Generic),
    ("DIMES ET OFFRANDES", 600, SectionKind::Generic),
    ("ANNONCE", 600, SectionKind::Speech),
    ("INSTANT DE TRIBUS ET FDV", 600, SectionKind::Generic),
    ("MESSAGE ET MINISTERE", 3600, SectionKind::Speech),
    ("DERNIERE ANNONCE ET PRESENTATION", 300, SectionKind::Speech),
    ("PRIERE DE FIN ET RENVOIE", 300, SectionKind::Generic),
];

/// Install the Sunday template unless one with the same name exists.
pub async fn seed_sunday_template(storage: &Storage) -> Result<(Template, bool)> {
    if let Some(existing) = storage
        .list_templates()
        .await?
        .into_iter()
        .find(|template| template.name == SUNDAY_TEMPLATE_NAME)
    {
        info!(template_id = %existing.id, "sunday template already present");
        return Ok((existing, false));
    }

    let items: Vec<NewTemplateItem> = SUNDAY_TEMPLATE_ITEMS
        .iter()
        .map(|(title, duration, kind)| NewTemplateItem {
            title: (*title).to_string(),
            duration: *duration,
            kind: *kind,
        })
        .collect();
    let template = storage
        .create_template_with_items(
            SUNDAY_TEMPLATE_NAME,
            Some(SUNDAY_TEMPLATE_DESCRIPTION),
            &items,
        )
        .await?;
    info!(template_id = %template.id, items = items.len(), "seeded sunday template");
    Ok((template, true))
}

#[cfg(test)]
#[path = "tests/seed_tests.rs"]
mod tests;
