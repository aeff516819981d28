//! Pure formatting of a [`ReflexContext`] into prompt-facing summaries.
//!
//! No IO, no state: the same context always renders the same strings, which
//! keeps prompt construction testable and retries byte-identical.

use botmind_reflex::ReflexContext;

use crate::blackboard::ContextView;

/// Render the two prompt summaries from the current reflex context.
pub fn build_context_view(ctx: &ReflexContext) -> ContextView {
    ContextView {
        self_summary: self_summary(ctx),
        environment_summary: environment_summary(ctx),
    }
}

fn self_summary(ctx: &ReflexContext) -> String {
    let position = match &ctx.self_state.position {
        Some(p) => format!("({:.1}, {:.1}, {:.1})", p.x, p.y, p.z),
        None => "unknown".to_string(),
    };
    let holding = ctx.self_state.holding.as_deref().unwrap_or("nothing");
    format!(
        "Position: {position}. Health: {:.0}/20, food: {:.0}/20. Holding: {holding}.",
        ctx.self_state.health, ctx.self_state.food
    )
}

fn environment_summary(ctx: &ReflexContext) -> String {
    let mut parts = Vec::new();

    if let Some(time) = &ctx.environment.time_of_day {
        parts.push(format!("Time: {time}."));
    }
    if let Some(weather) = &ctx.environment.weather {
        parts.push(format!("Weather: {weather}."));
    }

    if ctx.environment.nearby_players.is_empty() {
        parts.push("No players nearby.".to_string());
    } else {
        let players: Vec<String> = ctx
            .environment
            .nearby_players
            .iter()
            .map(|p| format!("{} ({:.0}m away)", p.name, p.distance))
            .collect();
        parts.push(format!("Nearby players: {}.", players.join(", ")));
    }

    if !ctx.environment.nearby_entities.is_empty() {
        parts.push(format!(
            "Other entities: {}.",
            ctx.environment.nearby_entities.join(", ")
        ));
    }
    if ctx.threat.score > 0.0 {
        parts.push(format!("Threat level: {:.1}.", ctx.threat.score));
    }

    parts.join(" ")
}
