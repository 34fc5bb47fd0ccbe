use super::{host_with, read};
use schematic_patcher::anchor::{after_last_change, before_first_change, Placement};
use schematic_patcher::apply::{write_changes, Document, FailurePolicy};
use schematic_patcher::config::{apply_patches, check_patches, load_from_str, PatchResult};
use schematic_patcher::finders::{
    class_members, find_decorator, find_decorator_property, find_imports,
    find_variable_initializer,
};
use schematic_patcher::host::{Host, MemoryHost};
use schematic_patcher::syntax::{find_by_identifier, find_nodes, NodeQuery, SyntaxKind};
use schematic_patcher::Change;

const ROUTING_PATH: &str = "src/app/app-routing.module.ts";

const ROUTING: &str = r#"import { Routes } from '@angular/router';
import { HomeComponent } from './home/home.component';

const routes: Routes = [
  { path: '', component: HomeComponent },
];
"#;

const EMPTY_ROUTING: &str = r#"import { Routes } from '@angular/router';

const routes: Routes = [];
"#;

/// Route registration the way a component generator does it: one import
/// after the last import, one route after the last route object (or inside
/// the empty array).
fn add_route(host: &mut MemoryHost, path: &str, component: &str, url: &str) {
    let document = Document::read(host, path).unwrap();
    let tree = document.parse().unwrap();

    let import = after_last_change(
        path,
        &find_imports(&tree),
        &format!(
            "\nimport {{ {component} }} from './{url}/{url}.component';"
        ),
        &Placement::new().fallback(0),
    )
    .unwrap();

    let routes = find_variable_initializer(&tree, "routes").unwrap();
    let existing = find_nodes(Some(routes), &NodeQuery::new(SyntaxKind::ObjectLiteral));
    let route = if existing.is_empty() {
        after_last_change(
            path,
            &existing,
            &format!("\n  {{ path: '{url}', component: {component} }}\n"),
            &Placement::new().fallback(routes.end() as i64 - 1),
        )
    } else {
        after_last_change(
            path,
            &existing,
            &format!(",\n  {{ path: '{url}', component: {component} }}"),
            &Placement::new(),
        )
    }
    .unwrap();

    let outcome = write_changes(host, path, &[import, route], FailurePolicy::AllOrNothing).unwrap();
    assert!(outcome.written);
    assert_eq!(outcome.applied.len(), 2);
}

#[test]
fn route_is_appended_after_the_last_route() {
    let mut host = host_with(&[(ROUTING_PATH, ROUTING)]);
    add_route(&mut host, ROUTING_PATH, "AboutComponent", "about");

    assert_eq!(
        read(&host, ROUTING_PATH),
        r#"import { Routes } from '@angular/router';
import { HomeComponent } from './home/home.component';
import { AboutComponent } from './about/about.component';

const routes: Routes = [
  { path: '', component: HomeComponent },
  { path: 'about', component: AboutComponent },
];
"#
    );
}

#[test]
fn first_route_goes_inside_the_empty_array() {
    let mut host = host_with(&[(ROUTING_PATH, EMPTY_ROUTING)]);
    add_route(&mut host, ROUTING_PATH, "AboutComponent", "about");

    assert_eq!(
        read(&host, ROUTING_PATH),
        r#"import { Routes } from '@angular/router';
import { AboutComponent } from './about/about.component';

const routes: Routes = [
  { path: 'about', component: AboutComponent }
];
"#
    );
}

#[test]
fn patched_routing_module_still_parses() {
    let mut host = host_with(&[(ROUTING_PATH, ROUTING)]);
    add_route(&mut host, ROUTING_PATH, "AboutComponent", "about");
    add_route(&mut host, ROUTING_PATH, "ContactComponent", "contact");

    let document = Document::read(&host, ROUTING_PATH).unwrap();
    let tree = document.parse().unwrap();
    assert!(!tree.has_errors());
    let routes = find_variable_initializer(&tree, "routes").unwrap();
    assert_eq!(
        find_nodes(Some(routes), &NodeQuery::new(SyntaxKind::ObjectLiteral)).len(),
        3
    );
}

const MODULE_PATH: &str = "src/app/app.module.ts";

const APP_MODULE: &str = r#"import { NgModule } from '@angular/core';
import { BrowserModule } from '@angular/platform-browser';

@NgModule({
  declarations: [AppComponent],
  imports: [BrowserModule],
  bootstrap: [AppComponent]
})
export class AppModule {}
"#;

/// Adds `module` to `@NgModule({ imports: [...] })`, returning false when it
/// is already listed.
fn add_module_import(host: &mut MemoryHost, module: &str) -> bool {
    let document = Document::read(host, MODULE_PATH).unwrap();
    let tree = document.parse().unwrap();
    let decorator = find_decorator(&tree, "NgModule").unwrap();
    let imports = find_decorator_property(decorator, "imports").unwrap();

    if find_by_identifier(&[imports], module).is_some() {
        return false;
    }

    let listed = find_nodes(Some(imports), &NodeQuery::new(SyntaxKind::Identifier));
    let change = after_last_change(
        MODULE_PATH,
        &listed,
        &format!(", {module}"),
        &Placement::new(),
    )
    .unwrap();
    write_changes(host, MODULE_PATH, &[change], FailurePolicy::PerEdit)
        .unwrap()
        .written
}

#[test]
fn module_import_is_added_once() {
    let mut host = host_with(&[(MODULE_PATH, APP_MODULE)]);

    assert!(add_module_import(&mut host, "HttpClientModule"));
    assert!(!add_module_import(&mut host, "HttpClientModule"));

    let patched = read(&host, MODULE_PATH);
    assert!(patched.contains("imports: [BrowserModule, HttpClientModule],"));
    assert_eq!(patched.matches("HttpClientModule").count(), 1);
}

#[test]
fn module_import_from_a_patch_file() {
    let config = load_from_str(
        r#"
[meta]
name = "http"
validate_syntax = true

[[patches]]
id = "http-client"
file = "src/app/app.module.ts"
skip_if_present = "HttpClientModule"

[patches.operation]
type = "insert"
text = ", HttpClientModule"

[patches.operation.anchor]
within = [
  { kind = "decorator", name = "NgModule" },
  { kind = "property-assignment", name = "imports" },
  { kind = "array-literal" },
]
kind = "identifier"
"#,
    )
    .unwrap();
    let mut host = host_with(&[(MODULE_PATH, APP_MODULE)]);

    let results = apply_patches(&config, &mut host);
    assert!(matches!(results[0].1, Ok(PatchResult::Applied { .. })));
    assert!(read(&host, MODULE_PATH).contains("imports: [BrowserModule, HttpClientModule],"));

    let results = check_patches(&config, &host);
    assert!(matches!(results[0].1, Ok(PatchResult::AlreadyApplied { .. })));
}

const COMPONENT_PATH: &str = "src/app/app.component.ts";

const COMPONENT: &str = r#"export class AppComponent {
  title = 'app';

  constructor() {}
}
"#;

#[test]
fn member_is_prepended_before_the_first_member() {
    let mut host = host_with(&[(COMPONENT_PATH, COMPONENT)]);
    let document = Document::read(&host, COMPONENT_PATH).unwrap();
    let tree = document.parse().unwrap();

    let change = before_first_change(
        COMPONENT_PATH,
        &class_members(&tree),
        "private readonly http = inject(HttpClient);\n\n  ",
        &Placement::new(),
    )
    .unwrap();
    write_changes(&mut host, COMPONENT_PATH, &[change], FailurePolicy::PerEdit).unwrap();

    assert_eq!(
        read(&host, COMPONENT_PATH),
        r#"export class AppComponent {
  private readonly http = inject(HttpClient);

  title = 'app';

  constructor() {}
}
"#
    );
}

#[test]
fn member_of_an_empty_class_uses_the_fallback() {
    let source = "export class EmptyComponent {}\n";
    let mut host = host_with(&[(COMPONENT_PATH, source)]);
    let document = Document::read(&host, COMPONENT_PATH).unwrap();
    let tree = document.parse().unwrap();

    let class = find_nodes(
        Some(tree.root()),
        &NodeQuery::new(SyntaxKind::ClassDeclaration),
    )[0];
    let members = class_members(&tree);
    assert!(members.is_empty());

    let change = before_first_change(
        COMPONENT_PATH,
        &members,
        "\n  title = 'empty';\n",
        &Placement::new().fallback(class.end() as i64 - 1),
    )
    .unwrap();
    write_changes(&mut host, COMPONENT_PATH, &[change], FailurePolicy::PerEdit).unwrap();

    assert_eq!(
        read(&host, COMPONENT_PATH),
        "export class EmptyComponent {\n  title = 'empty';\n}\n"
    );
}

#[test]
fn stale_change_is_rejected_without_touching_the_file() {
    let mut host = host_with(&[(COMPONENT_PATH, COMPONENT)]);
    let stale = Change::replace(COMPONENT_PATH, 30, "other", "x").unwrap();
    let fresh = Change::insert(COMPONENT_PATH, 0, "// generated\n").unwrap();

    let result = write_changes(
        &mut host,
        COMPONENT_PATH,
        &[fresh.clone(), stale.clone()],
        FailurePolicy::AllOrNothing,
    );
    assert!(result.is_err());
    assert_eq!(read(&host, COMPONENT_PATH), COMPONENT);

    let outcome =
        write_changes(&mut host, COMPONENT_PATH, &[fresh, stale], FailurePolicy::PerEdit).unwrap();
    assert_eq!(outcome.applied.len(), 1);
    assert_eq!(outcome.rejected.len(), 1);
    assert!(read(&host, COMPONENT_PATH).starts_with("// generated\nexport class"));
}
