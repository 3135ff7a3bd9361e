use axum::{extract::Query, Json};
use serde::Deserialize;

use crate::catalog::{filter_projects, Project, ProjectFilter};

#[derive(Deserialize, Default)]
pub struct ProjectsQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub risk: Option<String>,
}

pub async fn list_projects(Query(query): Query<ProjectsQuery>) -> Json<Vec<Project>> {
    let filter = ProjectFilter {
        search: query.search,
        category: query.category,
        risk: query.risk,
    };
    Json(filter_projects(&filter).into_iter().cloned().collect())
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::api::AppState;
    use crate::service::WalletService;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use common::db::SqliteStore;
    use common::store::AnyStore;
    use common::types::Session;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_list_projects_filtered() {
        let store = AnyStore::Sqlite(SqliteStore::open_memory().await.unwrap());
        let app = router(Arc::new(AppState::new(
            WalletService::new(store),
            Session::local("u1"),
            None,
        )));

        let req = Request::builder()
            .uri("/api/projects?search=pool&category=all&risk=Medio-Bajo")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        let json: Vec<Value> = serde_json::from_slice(&body).unwrap();
        assert_eq!(json.len(), 1);
        assert_eq!(json[0]["name"], "Lending Pool");
        assert_eq!(json[0]["min_investment"], 100);
    }
}
