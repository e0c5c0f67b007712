//! Integration tests for the inspection form engine.

use async_trait::async_trait;
use inspection_forms::{
    Ack, EventOutcome, FieldErrorKind, FieldKind, FieldValue, FileHandle, FormFilter, FormRecord,
    FormState, FormStatus, FormStore, FormsConfig, FormsError, FormsService, LoadError,
    MemoryFormStore, MemoryTemplateSource, RenderDispatcher, Session, SubmitError, Template,
    TemplateSource, WidgetEvent, WidgetKind,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use uuid::Uuid;

type Service = FormsService<MemoryTemplateSource, MemoryFormStore>;

fn service_with(config: FormsConfig) -> (Service, Arc<MemoryFormStore>) {
    let store = Arc::new(MemoryFormStore::new());
    let service = FormsService::new(
        config,
        MemoryTemplateSource::with_builtin().unwrap(),
        store.clone(),
    )
    .unwrap();
    (service, store)
}

fn service() -> (Service, Arc<MemoryFormStore>) {
    service_with(FormsConfig::default())
}

fn inspector() -> Session {
    Session::new("user-17", "inspector").with_claim("org", "acme-env")
}

#[tokio::test]
async fn test_list_templates_by_category() {
    let (service, _) = service();

    let all = service.list_templates(None).await.unwrap();
    let names: Vec<_> = all.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Bulk Sampling Form",
            "HMI Inventory Form",
            "XRF Testing Form",
            "General Service Log"
        ]
    );

    let inventory = service.list_templates(Some("inventory")).await.unwrap();
    assert_eq!(inventory.len(), 1);
    assert_eq!(inventory[0].id, "2");
}

#[tokio::test]
async fn test_get_template_is_cached_and_shared() {
    let (service, _) = service();
    let first = service.get_template("3").await.unwrap();
    let second = service.get_template("3").await.unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    assert!(matches!(
        service.get_template("99").await,
        Err(FormsError::TemplateNotFound(id)) if id == "99"
    ));
}

#[tokio::test]
async fn test_malformed_template_is_rejected_at_load() {
    let source = MemoryTemplateSource::new(Vec::new());
    let mut broken = Template::new("bad", "Broken", "x", Vec::new()).unwrap();
    broken.fields.push(inspection_forms::FieldDescriptor::text("a", "A"));
    broken.fields.push(inspection_forms::FieldDescriptor::text("a", "Again"));
    source.insert(broken);

    let service = FormsService::new(
        FormsConfig::default(),
        source,
        Arc::new(MemoryFormStore::new()),
    )
    .unwrap();

    assert!(matches!(
        service.start_form("bad", "p1", &inspector()).await,
        Err(FormsError::InvalidTemplate { template_id, .. }) if template_id == "bad"
    ));
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let result = FormsService::new(
        FormsConfig::new().with_max_file_size(0),
        MemoryTemplateSource::new(Vec::new()),
        Arc::new(MemoryFormStore::new()),
    );
    assert!(matches!(result, Err(FormsError::Config(_))));
}

#[tokio::test]
async fn test_required_quantity_blocks_submit() {
    let (service, store) = service();
    let form = service.start_form("1", "p1", &inspector()).await.unwrap();

    form.update(|f| {
        f.set_value("materialType", "Drywall")?;
        f.set_value("location", "2nd floor hallway")?;
        f.set_value("condition", "Good")?;
        f.set_value("unit", "sq.ft.")?;
        f.set_value("samplingMethod", "Core Sample")
    })
    .unwrap();

    match service.submit(&form).await {
        Err(FormsError::Invalid(errors)) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].field_id, "quantity");
            assert_eq!(errors[0].kind, FieldErrorKind::Required);
        }
        other => panic!("expected invalid form, got {:?}", other),
    }
    assert_eq!(form.state(), FormState::Invalid);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_bad_number_then_fixed_submits() {
    let (service, store) = service();
    let form = service.start_form("3", "p1", &inspector()).await.unwrap();

    form.update(|f| {
        f.set_value("substrate", "Wood")?;
        f.set_value("component", "Door")?;
        f.set_value("color", "White")?;
        f.set_value("location", "Unit 4 entry")?;
        f.set_value("reading", "abc")?;
        f.set_value("calibration", "Pass")?;
        f.set_value("result", "Negative")
    })
    .unwrap();

    let errors = form.update(|f| f.validate().clone());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors["reading"].kind, FieldErrorKind::TypeMismatch);

    form.update(|f| f.set_value("reading", "0.7")).unwrap();
    let ack = service.submit(&form).await.unwrap();
    assert_eq!(ack.id, form.id());
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_invalid_select_option() {
    let (service, _) = service();
    let form = service.start_form("2", "p1", &inspector()).await.unwrap();
    form.update(|f| f.set_value("condition", "Excellent")).unwrap();

    let error = form
        .update(|f| f.touch("condition"))
        .unwrap()
        .expect("condition should be rejected");
    assert_eq!(error.kind, FieldErrorKind::InvalidOption);
}

#[tokio::test]
async fn test_oversized_photo_rejected_on_selection() {
    let (service, _) = service_with(FormsConfig::new().with_max_file_size(2_000_000));
    let form = service.start_form("1", "p1", &inspector()).await.unwrap();
    let dispatcher = RenderDispatcher::new();

    let outcome = form
        .update(|f| {
            dispatcher.apply(
                f,
                WidgetEvent::SelectFiles {
                    field_id: "photos".into(),
                    files: vec![
                        FileHandle::new("ceiling.jpg", 1_500_000),
                        FileHandle::new("pipe.jpg", 2_000_001),
                    ],
                },
            )
        })
        .unwrap();

    match outcome {
        EventOutcome::Rejected(error) => {
            assert_eq!(error.kind, FieldErrorKind::FileTooLarge);
            assert!(error.message.contains("maximum size"));
        }
        other => panic!("expected rejection, got {:?}", other),
    }
    assert!(form.read(|f| f.value("photos").is_none()));
}

#[tokio::test]
async fn test_submitted_form_reloads_read_only() {
    let (service, _) = service();
    let session = inspector();
    let form = service.start_form("4", "p7", &session).await.unwrap();

    form.update(|f| {
        f.set_value("activityType", "Monitoring")?;
        f.set_value("startTime", "08:30")?;
        f.set_value("endTime", "11:45")?;
        f.set_value("location", "Boiler room")?;
        f.set_value("personnel", "J. Ortiz")?;
        f.set_value("observations", "Air monitoring during abatement")?;
        f.set_value("followUpRequired", true)
    })
    .unwrap();
    service.submit(&form).await.unwrap();

    let reloaded = service.load_form(form.id()).await.unwrap();
    assert_eq!(reloaded.state(), FormState::Submitted);
    reloaded.read(|f| {
        assert_eq!(f.status(), FormStatus::Completed);
        assert_eq!(f.record().created_by.as_deref(), Some("user-17"));
        assert_eq!(f.value("followUpRequired"), Some(&FieldValue::Bool(true)));
    });
    assert!(matches!(
        reloaded.update(|f| f.set_value("location", "Roof")),
        Err(FormsError::ReadOnly(_))
    ));

    let view = reloaded.read(|f| RenderDispatcher::new().render(f));
    assert!(view.read_only);
    assert_eq!(view.progress, 100);
}

#[tokio::test]
async fn test_load_unknown_form() {
    let (service, _) = service();
    let id = Uuid::new_v4();
    assert!(matches!(
        service.load_form(id).await,
        Err(FormsError::FormNotFound(missing)) if missing == id
    ));
}

#[tokio::test]
async fn test_list_forms_by_project() {
    let (service, _) = service();
    let session = inspector();

    let form = service.start_form("3", "p1", &session).await.unwrap();
    form.update(|f| {
        f.set_value("substrate", "Metal")?;
        f.set_value("component", "Trim")?;
        f.set_value("color", "Grey")?;
        f.set_value("location", "Stairwell B")?;
        f.set_value("reading", 1.2)?;
        f.set_value("calibration", "Pass")?;
        f.set_value("result", "Positive")
    })
    .unwrap();
    service.submit(&form).await.unwrap();

    let completed = service
        .list_forms(&FormFilter::new().project("p1").status(FormStatus::Completed))
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].name, "XRF Testing Form");
    assert_eq!(
        completed[0].values.get("reading"),
        Some(&FieldValue::Number(1.2))
    );

    let other_project = service
        .list_forms(&FormFilter::new().project("p2"))
        .await
        .unwrap();
    assert!(other_project.is_empty());
}

#[tokio::test]
async fn test_render_builtin_service_log() {
    let (service, _) = service();
    let form = service.start_form("4", "p1", &inspector()).await.unwrap();
    let view = form.read(|f| RenderDispatcher::new().render(f));

    assert_eq!(view.title, "General Service Log");
    let template = service.get_template("4").await.unwrap();
    assert_eq!(view.widgets.len(), template.fields.len());
    for (widget, field) in view.widgets.iter().zip(&template.fields) {
        assert_eq!(widget.field_id, field.id);
        let expected = match field.kind {
            FieldKind::Time => WidgetKind::TimePicker,
            FieldKind::Select => WidgetKind::Select,
            FieldKind::Checkbox => WidgetKind::Switch,
            FieldKind::Textarea => WidgetKind::TextArea,
            FieldKind::File => WidgetKind::FileUpload,
            _ => WidgetKind::TextInput,
        };
        assert_eq!(widget.widget, expected);
        assert!(widget.error.is_none());
    }
}

/// Collaborator that never answers.
struct Unresponsive;

#[async_trait]
impl TemplateSource for Unresponsive {
    async fn list_templates(&self, _category: Option<&str>) -> Result<Vec<Template>, LoadError> {
        std::future::pending().await
    }

    async fn get_template(&self, _id: &str) -> Result<Template, LoadError> {
        std::future::pending().await
    }
}

#[async_trait]
impl FormStore for Unresponsive {
    async fn save(&self, _record: &FormRecord) -> Result<Ack, SubmitError> {
        std::future::pending().await
    }

    async fn load(&self, _form_id: Uuid) -> Result<FormRecord, LoadError> {
        std::future::pending().await
    }

    async fn list(&self, _filter: &FormFilter) -> Result<Vec<FormRecord>, LoadError> {
        std::future::pending().await
    }
}

fn is_load_timeout<T>(result: Result<T, FormsError>) -> bool {
    matches!(result, Err(FormsError::Load(LoadError::Timeout)))
}

#[tokio::test]
async fn test_template_fetch_times_out() {
    let service = FormsService::new(
        FormsConfig::new().with_load_timeout(100),
        Unresponsive,
        Arc::new(MemoryFormStore::new()),
    )
    .unwrap();

    assert!(is_load_timeout(service.list_templates(None).await));
    assert!(is_load_timeout(service.get_template("1").await));
    assert!(is_load_timeout(service.start_form("1", "p1", &inspector()).await));
}

#[tokio::test]
async fn test_form_load_and_list_time_out() {
    let service = FormsService::new(
        FormsConfig::new().with_load_timeout(100),
        MemoryTemplateSource::with_builtin().unwrap(),
        Arc::new(Unresponsive),
    )
    .unwrap();

    assert!(is_load_timeout(service.load_form(Uuid::new_v4()).await));
    assert!(is_load_timeout(service.list_forms(&FormFilter::new()).await));
}

#[tokio::test]
async fn test_non_finite_note_blocks_submit_and_listing_survives() {
    let (service, store) = service();
    let session = inspector();

    let good = service.start_form("4", "p1", &session).await.unwrap();
    good.update(|f| {
        f.set_value("activityType", "Monitoring")?;
        f.set_value("startTime", "08:30")?;
        f.set_value("endTime", "09:00")?;
        f.set_value("location", "Boiler room")?;
        f.set_value("personnel", "J. Ortiz")?;
        f.set_value("observations", "Clear")
    })
    .unwrap();
    service.submit(&good).await.unwrap();

    let bad = service.start_form("4", "p1", &session).await.unwrap();
    bad.update(|f| {
        f.set_value("activityType", "Monitoring")?;
        f.set_value("startTime", "10:00")?;
        f.set_value("endTime", "11:00")?;
        f.set_value("location", "Roof")?;
        f.set_value("personnel", "J. Ortiz")?;
        f.set_value("observations", f64::NAN)
    })
    .unwrap();

    match service.submit(&bad).await {
        Err(FormsError::Invalid(errors)) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].field_id, "observations");
            assert_eq!(errors[0].kind, FieldErrorKind::TypeMismatch);
        }
        other => panic!("expected invalid form, got {:?}", other),
    }
    assert_eq!(store.len(), 1);

    let reloaded = service.load_form(good.id()).await.unwrap();
    assert_eq!(reloaded.state(), FormState::Submitted);
    let listed = service
        .list_forms(&FormFilter::new().project("p1"))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
}
