use super::host_with;
use schematic_patcher::finders::{find_module, FinderError};
use schematic_patcher::host::MemoryHost;
use schematic_patcher::workspace::{WorkspaceConfig, WorkspaceError};
use std::path::{Path, PathBuf};

const ANGULAR_JSON: &str = r#"{
  "version": 1,
  "newProjectRoot": "projects",
  "defaultProject": "shop",
  "projects": {
    "shop": {
      "root": "",
      "sourceRoot": "src",
      "projectType": "application",
      "prefix": "app"
    },
    "admin": {
      "root": "projects/admin",
      "projectType": "application"
    }
  }
}"#;

fn workspace() -> MemoryHost {
    host_with(&[
        ("angular.json", ANGULAR_JSON),
        ("src/app/app.module.ts", "export class AppModule {}\n"),
        ("src/app/app-routing.module.ts", "export class AppRoutingModule {}\n"),
        ("src/app/cart/cart.module.ts", "export class CartModule {}\n"),
        ("src/app/cart/cart-routing.module.ts", "export class CartRoutingModule {}\n"),
        ("src/app/cart/line/line.component.ts", "export class LineComponent {}\n"),
        ("projects/admin/src/app/users/users.component.ts", "export class UsersComponent {}\n"),
    ])
}

#[test]
fn new_component_lands_in_the_closest_module() {
    let host = workspace();
    let config = WorkspaceConfig::load(&host).unwrap();
    let (name, project) = config.project_or_default(None).unwrap();
    assert_eq!(name, "shop");

    let target = project.app_dir().join("cart/line");
    assert_eq!(
        find_module(&host, &target, None).unwrap(),
        PathBuf::from("src/app/cart/cart.module.ts")
    );

    let sibling = project.app_dir().join("checkout");
    assert_eq!(
        find_module(&host, &sibling, None).unwrap(),
        PathBuf::from("src/app/app.module.ts")
    );
}

#[test]
fn named_module_is_preferred() {
    let host = workspace();
    let found = find_module(&host, Path::new("src/app/cart/line"), Some("app")).unwrap();
    assert_eq!(found, PathBuf::from("src/app/app.module.ts"));
}

#[test]
fn project_without_modules_is_an_error() {
    let host = workspace();
    let config = WorkspaceConfig::load(&host).unwrap();
    let admin = config.project("admin").unwrap();
    assert_eq!(admin.source_root(), PathBuf::from("projects/admin/src"));

    let err = find_module(&host, admin.app_dir().join("users"), None).unwrap_err();
    assert!(matches!(err, FinderError::NoModule { .. }));
}

#[test]
fn misspelled_project_gets_a_suggestion() {
    let host = workspace();
    let config = WorkspaceConfig::load(&host).unwrap();
    let err = config.project("shopp").unwrap_err();
    assert!(matches!(
        &err,
        WorkspaceError::UnknownProject { suggestion: Some(s), .. } if s == "shop"
    ));
    assert!(err.to_string().contains("did you mean 'shop'?"));
}

#[test]
fn missing_workspace_file_is_reported() {
    let host = host_with(&[("src/main.ts", "")]);
    assert!(matches!(
        WorkspaceConfig::load(&host),
        Err(WorkspaceError::Missing { .. })
    ));
}

#[test]
fn named_module_matches_by_file_name_suffix() {
    let host = host_with(&[
        ("src/app/icons/myicons.module.ts", "export class MyIconsModule {}\n"),
        ("src/app/icons/star.component.ts", "export class StarComponent {}\n"),
    ]);
    assert_eq!(
        find_module(&host, Path::new("src/app/icons"), Some("icons")).unwrap(),
        PathBuf::from("src/app/icons/myicons.module.ts")
    );
}
