//! Fixtures shared by unit tests

use vela_core::{
    Application, ApplicationComponent, ApplicationRevision, ApplicationRevisionSpec, ApplicationSpec, oam,
};

pub fn app(namespace: &str, name: &str) -> Application {
    let mut app = Application::new(name, ApplicationSpec::default());
    app.metadata.namespace = Some(namespace.to_string());
    app
}

pub fn app_with_component(namespace: &str, name: &str, component: &str, component_type: &str) -> Application {
    let mut app = app(namespace, name);
    app.spec.components.push(ApplicationComponent {
        name: component.to_string(),
        component_type: component_type.to_string(),
        ..Default::default()
    });
    app
}

pub fn revision(namespace: &str, app_name: &str, number: u64) -> ApplicationRevision {
    let mut revision = ApplicationRevision::new(
        &format!("{}-v{}", app_name, number),
        ApplicationRevisionSpec {
            application: app(namespace, app_name),
        },
    );
    revision.metadata.namespace = Some(namespace.to_string());
    revision.metadata.labels = Some(
        [(oam::LABEL_APP_NAME.to_string(), app_name.to_string())]
            .into_iter()
            .collect(),
    );
    revision
}
