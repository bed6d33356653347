//! Built-in popup markup, used when the page does not ship its own `<template>` elements.

pub const INCIDENT_POPUP: &str = r#"<div class="popup incident-popup urgency-{urgency}">
<h3>{type}</h3>
<p>{description}</p>
<img class="incident-image" src="{image_path}" style="display: {image_display}" alt="Incident photo">
<p><strong>Reported:</strong> {time}</p>
<p><strong>Urgency:</strong> <span class="urgency-badge {urgency}">{urgency}</span></p>
<p><strong>Verified by:</strong> {verification_count} users</p>
<button class="btn small verify-button" data-id="{id}">Verify</button>
<button class="btn small directions-button" data-lat="{latitude}" data-lng="{longitude}"><i class="fas fa-directions"></i> Directions</button>
</div>"#;

pub const RESOURCE_POPUP: &str = r#"<div class="popup resource-popup status-{status}">
<h3>{name}</h3>
<p class="resource-type">{type}</p>
<p>{description}</p>
<p><strong>Capacity:</strong> {capacity}</p>
<p><strong>Contact:</strong> {contact}</p>
<p><strong>Status:</strong> {status}</p>
<button class="btn small directions-button" data-lat="{latitude}" data-lng="{longitude}"><i class="fas fa-directions"></i> Directions</button>
</div>"#;

pub const SHELTER_POPUP: &str = r#"<div class="popup shelter-popup status-{status}">
<h3>{name}</h3>
<p>{description}</p>
<p><strong>Capacity:</strong> {capacity}</p>
<p><strong>Contact:</strong> {contact}</p>
<p><strong>Status:</strong> {status}</p>
<div class="resources-tags">{resources_tags}</div>
<button class="btn small directions-button" data-lat="{latitude}" data-lng="{longitude}"><i class="fas fa-directions"></i> Directions</button>
</div>"#;

pub const SOS_POPUP: &str = r#"<div class="popup sos-popup">
<h3>SOS Alert</h3>
<p><strong>User:</strong> {user}</p>
<p>{message}</p>
<p><strong>Time:</strong> {time}</p>
</div>"#;

pub const BROADCAST_POPUP: &str = r#"<div class="popup broadcast-popup">
<h3>Emergency Broadcast</h3>
<p>{message}</p>
<p><strong>From:</strong> {sender}</p>
<p><strong>Radius:</strong> {radius}km</p>
<p><strong>Time:</strong> {time}</p>
</div>"#;
