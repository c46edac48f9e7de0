//! Authoring operations: events, their programs, members and templates.

use shared::{
    domain::{
        Event, EventDetails, EventId, EventPatch, Member, MemberId, NewEvent, NewMember,
        NewTemplateItem, Section, SectionDraft, SectionId, Template, TemplateId, TemplateItem,
    },
    error::{ApiError, ErrorCode},
    protocol::ServerEvent,
};
use storage::EventRecordStore;
use tracing::info;

use crate::{store_error, ApiContext, Applied};

pub async fn create_event(ctx: &ApiContext, new: &NewEvent) -> Result<Applied<Event>, ApiError> {
    let title = required_text(&new.title, "event title")?;
    let event = match new.template_id {
        Some(template_id) => ctx
            .storage
            .create_event_from_template(&title, new.date, template_id)
            .await
            .map_err(store_error)?,
        None => ctx
            .storage
            .create_event(&title, new.date)
            .await
            .map_err(store_error)?,
    };
    info!(event_id = event.id.0, template = ?new.template_id, "created event");

    let mut changes = vec![ServerEvent::EventUpdated {
        event: event.clone(),
    }];
    if new.template_id.is_some() {
        changes.push(sections_changed(ctx, event.id).await?);
    }
    Ok(Applied::new(event, changes))
}

pub async fn list_events(ctx: &ApiContext) -> Result<Vec<Event>, ApiError> {
    ctx.storage.list_events().await.map_err(store_error)
}

pub async fn update_event_details(
    ctx: &ApiContext,
    event_id: EventId,
    details: &EventDetails,
) -> Result<Applied<Event>, ApiError> {
    if let Some(title) = &details.title {
        required_text(title, "event title")?;
    }
    let patch = EventPatch::from(details);
    let event = ctx
        .storage
        .write_event(event_id, &patch, None)
        .await
        .map_err(store_error)?;
    Ok(Applied::new(
        event.clone(),
        vec![ServerEvent::EventUpdated { event }],
    ))
}

pub async fn delete_event(ctx: &ApiContext, event_id: EventId) -> Result<Applied<()>, ApiError> {
    if !ctx
        .storage
        .delete_event(event_id)
        .await
        .map_err(store_error)?
    {
        return Err(ApiError::not_found(format!("event {event_id}")));
    }
    info!(event_id = event_id.0, "deleted event");
    Ok(Applied::new((), vec![ServerEvent::EventDeleted { event_id }]))
}

pub async fn list_sections(ctx: &ApiContext, event_id: EventId) -> Result<Vec<Section>, ApiError> {
    ensure_event(ctx, event_id).await?;
    ctx.storage
        .list_sections(event_id)
        .await
        .map_err(store_error)
}

pub async fn append_section(
    ctx: &ApiContext,
    event_id: EventId,
    draft: &SectionDraft,
) -> Result<Applied<Section>, ApiError> {
    ensure_event(ctx, event_id).await?;
    validate_draft(draft)?;
    let section = ctx
        .storage
        .append_section(event_id, draft)
        .await
        .map_err(store_error)?;
    let change = sections_changed(ctx, event_id).await?;
    Ok(Applied::new(section, vec![change]))
}

pub async fn update_section(
    ctx: &ApiContext,
    section_id: SectionId,
    draft: &SectionDraft,
) -> Result<Applied<Section>, ApiError> {
    validate_draft(draft)?;
    let section = ctx
        .storage
        .update_section(section_id, draft)
        .await
        .map_err(store_error)?;
    let change = sections_changed(ctx, section.event_id).await?;
    Ok(Applied::new(section, vec![change]))
}

pub async fn delete_section(ctx: &ApiContext, section_id: SectionId) -> Result<Applied<()>, ApiError> {
    let event_id = ctx
        .storage
        .delete_section(section_id)
        .await
        .map_err(store_error)?;
    let change = sections_changed(ctx, event_id).await?;
    Ok(Applied::new((), vec![change]))
}

pub async fn reorder_sections(
    ctx: &ApiContext,
    event_id: EventId,
    ordered: &[SectionId],
) -> Result<Applied<Vec<Section>>, ApiError> {
    ensure_event(ctx, event_id).await?;
    let sections = ctx
        .storage
        .reorder_sections(event_id, ordered)
        .await
        .map_err(store_error)?;
    let change = ServerEvent::SectionsChanged {
        event_id,
        sections: sections.clone(),
    };
    Ok(Applied::new(sections, vec![change]))
}

pub async fn create_member(ctx: &ApiContext, member: &NewMember) -> Result<Member, ApiError> {
    required_text(&member.full_name, "member name")?;
    ctx.storage
        .create_member(member)
        .await
        .map_err(store_error)
}

pub async fn list_members(ctx: &ApiContext, search: Option<&str>) -> Result<Vec<Member>, ApiError> {
    ctx.storage
        .list_members(search)
        .await
        .map_err(store_error)
}

pub async fn delete_member(ctx: &ApiContext, member_id: MemberId) -> Result<(), ApiError> {
    if ctx
        .storage
        .delete_member(member_id)
        .await
        .map_err(store_error)?
    {
        Ok(())
    } else {
        Err(ApiError::not_found(format!("member {member_id}")))
    }
}

pub async fn create_template(
    ctx: &ApiContext,
    name: &str,
    description: Option<&str>,
) -> Result<Template, ApiError> {
    let name = required_text(name, "template name")?;
    ctx.storage
        .create_template(&name, description)
        .await
        .map_err(store_error)
}

pub async fn list_templates(ctx: &ApiContext) -> Result<Vec<Template>, ApiError> {
    ctx.storage.list_templates().await.map_err(store_error)
}

pub async fn list_template_items(
    ctx: &ApiContext,
    template_id: TemplateId,
) -> Result<Vec<TemplateItem>, ApiError> {
    ctx.storage
        .list_template_items(template_id)
        .await
        .map_err(store_error)
}

pub async fn add_template_item(
    ctx: &ApiContext,
    template_id: TemplateId,
    item: &NewTemplateItem,
) -> Result<TemplateItem, ApiError> {
    required_text(&item.title, "item title")?;
    if item.duration < 0 {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "duration must not be negative",
        ));
    }
    let known = ctx
        .storage
        .list_templates()
        .await
        .map_err(store_error)?
        .iter()
        .any(|template| template.id == template_id);
    if !known {
        return Err(ApiError::not_found(format!("template {template_id}")));
    }
    ctx.storage
        .add_template_item(template_id, item)
        .await
        .map_err(store_error)
}

pub async fn delete_template(ctx: &ApiContext, template_id: TemplateId) -> Result<(), ApiError> {
    if ctx
        .storage
        .delete_template(template_id)
        .await
        .map_err(store_error)?
    {
        Ok(())
    } else {
        Err(ApiError::not_found(format!("template {template_id}")))
    }
}

async fn ensure_event(ctx: &ApiContext, event_id: EventId) -> Result<Event, ApiError> {
    ctx.storage
        .get_event(event_id)
        .await
        .map_err(store_error)?
        .ok_or_else(|| ApiError::not_found(format!("event {event_id}")))
}

async fn sections_changed(ctx: &ApiContext, event_id: EventId) -> Result<ServerEvent, ApiError> {
    let sections = ctx
        .storage
        .list_sections(event_id)
        .await
        .map_err(store_error)?;
    Ok(ServerEvent::SectionsChanged { event_id, sections })
}

fn required_text(raw: &str, what: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("{what} must not be empty"),
        ));
    }
    Ok(trimmed.to_string())
}

fn validate_draft(draft: &SectionDraft) -> Result<(), ApiError> {
    match draft.duration {
        Some(duration) if duration < 0 => Err(ApiError::new(
            ErrorCode::Validation,
            "duration must not be negative",
        )),
        _ => Ok(()),
    }
}
