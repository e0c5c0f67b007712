//! Built-in inspection templates.

use crate::error::FormsResult;
use crate::types::{FieldDescriptor, Template};

const CONDITIONS: [&str; 4] = ["Good", "Fair", "Poor", "Damaged"];
const LEVELS: [&str; 3] = ["High", "Moderate", "Low"];

/// The stock field-work templates: bulk sampling, hazardous materials
/// inventory, XRF testing and the general service log.
pub fn builtin_templates() -> FormsResult<Vec<Template>> {
    Ok(vec![
        bulk_sampling()?,
        hmi_inventory()?,
        xrf_testing()?,
        service_log()?,
    ])
}

fn photos() -> FieldDescriptor {
    FieldDescriptor::file("photos", "Photos")
        .multiple()
        .accept("image/*")
}

fn notes() -> FieldDescriptor {
    FieldDescriptor::textarea("notes", "Notes")
}

fn location() -> FieldDescriptor {
    FieldDescriptor::text("location", "Location Description").required()
}

fn bulk_sampling() -> FormsResult<Template> {
    Ok(Template::new(
        "1",
        "Bulk Sampling Form",
        "sampling",
        vec![
            FieldDescriptor::select(
                "materialType",
                "Material Type",
                ["Drywall", "Insulation", "Tile", "Pipe Material", "Other"],
            )?
            .required(),
            location(),
            FieldDescriptor::select("condition", "Material Condition", CONDITIONS)?.required(),
            FieldDescriptor::number("quantity", "Estimated Quantity").required(),
            FieldDescriptor::select("unit", "Unit", ["sq.ft.", "linear ft.", "cu.ft."])?.required(),
            FieldDescriptor::select(
                "samplingMethod",
                "Sampling Method",
                ["Core Sample", "Bulk Collection", "Surface Wipe", "Air Sample"],
            )?
            .required(),
            notes(),
            photos(),
        ],
    )?
    .with_description("Form for recording bulk material sampling information"))
}

fn hmi_inventory() -> FormsResult<Template> {
    Ok(Template::new(
        "2",
        "HMI Inventory Form",
        "inventory",
        vec![
            FieldDescriptor::select(
                "materialCategory",
                "Material Category",
                ["Asbestos", "Lead", "PCBs", "Mercury", "Other"],
            )?
            .required(),
            location(),
            FieldDescriptor::select("condition", "Material Condition", CONDITIONS)?.required(),
            FieldDescriptor::number("quantity", "Estimated Quantity").required(),
            FieldDescriptor::select("unit", "Unit", ["sq.ft.", "linear ft.", "cu.ft.", "each"])?
                .required(),
            FieldDescriptor::select("accessibility", "Accessibility", LEVELS)?.required(),
            FieldDescriptor::select("disturbance", "Potential for Disturbance", LEVELS)?.required(),
            notes(),
            photos(),
        ],
    )?
    .with_description("Form for documenting hazardous materials inventory"))
}

fn xrf_testing() -> FormsResult<Template> {
    Ok(Template::new(
        "3",
        "XRF Testing Form",
        "testing",
        vec![
            FieldDescriptor::select(
                "substrate",
                "Substrate",
                ["Drywall", "Wood", "Metal", "Concrete", "Brick", "Other"],
            )?
            .required(),
            FieldDescriptor::select(
                "component",
                "Component",
                ["Wall", "Door", "Window", "Trim", "Floor", "Ceiling", "Other"],
            )?
            .required(),
            FieldDescriptor::text("color", "Color").required(),
            location(),
            FieldDescriptor::number("reading", "XRF Reading (mg/cm²)").required(),
            FieldDescriptor::text("calibration", "Calibration Check").required(),
            FieldDescriptor::select("result", "Result", ["Positive", "Negative", "Inconclusive"])?
                .required(),
            notes(),
        ],
    )?
    .with_description("Form for recording XRF testing results"))
}

fn service_log() -> FormsResult<Template> {
    Ok(Template::new(
        "4",
        "General Service Log",
        "service",
        vec![
            FieldDescriptor::select(
                "activityType",
                "Activity Type",
                [
                    "Initial Assessment",
                    "Follow-up Inspection",
                    "Monitoring",
                    "Clearance Testing",
                    "Other",
                ],
            )?
            .required(),
            FieldDescriptor::time("startTime", "Start Time").required(),
            FieldDescriptor::time("endTime", "End Time").required(),
            location(),
            FieldDescriptor::text("personnel", "Personnel Present").required(),
            FieldDescriptor::textarea("observations", "Observations").required(),
            FieldDescriptor::textarea("actionItems", "Action Items"),
            FieldDescriptor::checkbox("followUpRequired", "Follow-up Required"),
            photos(),
        ],
    )?
    .with_description("Form for documenting general inspection activities"))
}
