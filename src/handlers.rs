use crate::{error::RequestError, products::Product, state::AppState};
use axum::{extract::State, Json};

pub async fn list_products(
    State(st): State<AppState>,
) -> Result<Json<Vec<Product>>, RequestError> {
    let list = st
        .store
        .list_products()
        .await
        .map_err(RequestError::ListProducts)?;

    Ok(Json(list))
}
