//! `KeyService` gRPC implementation: decode → validate → authorize →
//! delegate to [`key_service::KeyService`] → encode. Authentication and
//! rate limiting already happened in [`InterceptorChain::enter`] by the
//! time a handler body runs.
use std::sync::Arc;

use prost::Message;
use tonic::{Request, Response, Status};

use crate::error::IntoStatus;
use crate::interceptors::InterceptorChain;

use super::convert::{
    data_classification_from_proto, from_prost_timestamp, key_material_to_proto, key_metadata_to_proto,
    key_type_from_proto, parse_uuid, to_prost_timestamp,
};
use super::polykey::{self, key_service_server::KeyService as KeyServiceTrait};
use crate::interceptors::validate;

pub struct KeyServiceImpl {
    service: Arc<key_service::KeyService>,
    chain: Arc<InterceptorChain>,
}

impl KeyServiceImpl {
    pub fn new(service: Arc<key_service::KeyService>, chain: Arc<InterceptorChain>) -> Self {
        Self { service, chain }
    }

    fn enter<T>(&self, request: &Request<T>, rpc: &str) -> Result<key_service::RequesterContext, Status> {
        self.chain.enter(request.metadata(), &format!("/polykey.v1.KeyService/{rpc}"))
    }
}

fn outcome_to_get_key_result(
    outcome: key_service::BatchOutcome<key_service::GetKeyResponse>,
) -> polykey::BatchGetKeyResult {
    match outcome {
        key_service::BatchOutcome::Success(resp) => polykey::BatchGetKeyResult {
            key_id: resp.metadata.as_ref().map(|m| m.key_id.to_string()).unwrap_or_default(),
            outcome: Some(polykey::batch_get_key_result::Outcome::Success(get_key_response_to_proto(resp))),
        },
        key_service::BatchOutcome::Error { key_id, message } => polykey::BatchGetKeyResult {
            key_id: key_id.to_string(),
            outcome: Some(polykey::batch_get_key_result::Outcome::Error(message)),
        },
    }
}

fn outcome_to_get_key_metadata_result(
    outcome: key_service::BatchOutcome<key_service::GetKeyMetadataResponse>,
) -> polykey::BatchGetKeyMetadataResult {
    match outcome {
        key_service::BatchOutcome::Success(resp) => polykey::BatchGetKeyMetadataResult {
            key_id: resp.metadata.key_id.to_string(),
            outcome: Some(polykey::batch_get_key_metadata_result::Outcome::Success(
                get_key_metadata_response_to_proto(resp),
            )),
        },
        key_service::BatchOutcome::Error { key_id, message } => polykey::BatchGetKeyMetadataResult {
            key_id: key_id.to_string(),
            outcome: Some(polykey::batch_get_key_metadata_result::Outcome::Error(message)),
        },
    }
}

fn outcome_to_create_key_result(
    outcome: key_service::BatchOutcome<key_service::CreateKeyResponse>,
) -> polykey::BatchCreateKeyResult {
    match outcome {
        key_service::BatchOutcome::Success(resp) => polykey::BatchCreateKeyResult {
            outcome: Some(polykey::batch_create_key_result::Outcome::Success(create_key_response_to_proto(resp))),
        },
        key_service::BatchOutcome::Error { message, .. } => polykey::BatchCreateKeyResult {
            outcome: Some(polykey::batch_create_key_result::Outcome::Error(message)),
        },
    }
}

fn get_key_response_to_proto(resp: key_service::GetKeyResponse) -> polykey::GetKeyResponse {
    polykey::GetKeyResponse {
        key_material: Some(key_material_to_proto(&resp.key_material)),
        metadata: resp.metadata.as_ref().map(key_metadata_to_proto),
        response_timestamp: Some(to_prost_timestamp(resp.response_timestamp)),
        authorization_decision_id: resp.authorization_decision_id.unwrap_or_default(),
    }
}

fn get_key_metadata_response_to_proto(resp: key_service::GetKeyMetadataResponse) -> polykey::GetKeyMetadataResponse {
    polykey::GetKeyMetadataResponse {
        metadata: Some(key_metadata_to_proto(&resp.metadata)),
        access_history: resp.access_history.unwrap_or_default(),
        policy_details: resp.policy_details,
        response_timestamp: Some(to_prost_timestamp(resp.response_timestamp)),
    }
}

fn create_key_response_to_proto(resp: key_service::CreateKeyResponse) -> polykey::CreateKeyResponse {
    polykey::CreateKeyResponse {
        key_id: resp.key_id.to_string(),
        metadata: Some(key_metadata_to_proto(&resp.metadata)),
        key_material: Some(key_material_to_proto(&resp.key_material)),
        response_timestamp: Some(to_prost_timestamp(resp.response_timestamp)),
    }
}

fn create_key_request_from_proto(
    requester: key_service::RequesterContext,
    req: polykey::CreateKeyRequest,
) -> Result<key_service::CreateKeyRequest, Status> {
    validate::validate_description(&req.description)?;
    validate::validate_tags(&req.tags)?;
    validate::validate_authorized_contexts(&req.initial_authorized_contexts)?;
    validate::validate_access_policies(&req.access_policies)?;

    Ok(key_service::CreateKeyRequest {
        requester,
        key_type: key_type_from_proto(req.key_type)?,
        description: (!req.description.is_empty()).then_some(req.description),
        expires_at: from_prost_timestamp(req.expires_at),
        authorized_contexts: req.initial_authorized_contexts,
        access_policies: req.access_policies,
        tags: req.tags,
        data_classification: data_classification_from_proto(req.data_classification),
    })
}

#[tonic::async_trait]
impl KeyServiceTrait for KeyServiceImpl {
    async fn create_key(
        &self,
        request: Request<polykey::CreateKeyRequest>,
    ) -> Result<Response<polykey::CreateKeyResponse>, Status> {
        let requester = self.enter(&request, "CreateKey")?;
        let proto_req = request.into_inner();
        validate::validate_size_budget(proto_req.encoded_len())?;

        let classification = data_classification_from_proto(proto_req.data_classification);
        if let Some(classification) = classification {
            self.chain.authorizer().check_create(requester.tier, classification)?;
        }

        let domain_req = create_key_request_from_proto(requester, proto_req)?;
        let resp = self.service.create_key(domain_req).await.map_err(IntoStatus::into_status)?;
        Ok(Response::new(create_key_response_to_proto(resp)))
    }

    async fn get_key(&self, request: Request<polykey::GetKeyRequest>) -> Result<Response<polykey::GetKeyResponse>, Status> {
        let requester = self.enter(&request, "GetKey")?;
        let proto_req = request.into_inner();
        validate::validate_size_budget(proto_req.encoded_len())?;
        let key_id = parse_uuid(&proto_req.key_id, "key_id")?;

        let resp = self
            .service
            .get_key(key_service::GetKeyRequest {
                requester,
                key_id,
                version: proto_req.version,
                skip_metadata: proto_req.skip_metadata,
            })
            .await
            .map_err(IntoStatus::into_status)?;
        Ok(Response::new(get_key_response_to_proto(resp)))
    }

    async fn get_key_metadata(
        &self,
        request: Request<polykey::GetKeyMetadataRequest>,
    ) -> Result<Response<polykey::GetKeyMetadataResponse>, Status> {
        let requester = self.enter(&request, "GetKeyMetadata")?;
        let proto_req = request.into_inner();
        validate::validate_size_budget(proto_req.encoded_len())?;
        let key_id = parse_uuid(&proto_req.key_id, "key_id")?;

        let resp = self
            .service
            .get_key_metadata(key_service::GetKeyMetadataRequest {
                requester,
                key_id,
                version: proto_req.version,
                include_access_history: proto_req.include_access_history,
                include_policy_details: proto_req.include_policy_details,
            })
            .await
            .map_err(IntoStatus::into_status)?;
        Ok(Response::new(get_key_metadata_response_to_proto(resp)))
    }

    async fn list_keys(&self, request: Request<polykey::ListKeysRequest>) -> Result<Response<polykey::ListKeysResponse>, Status> {
        let requester = self.enter(&request, "ListKeys")?;
        let proto_req = request.into_inner();
        validate::validate_size_budget(proto_req.encoded_len())?;

        let page_size = validate::clamp_page_size(proto_req.page_size)?;
        validate::validate_page_token(&proto_req.page_token)?;
        let created_after = from_prost_timestamp(proto_req.created_after);
        let created_before = from_prost_timestamp(proto_req.created_before);
        validate::validate_date_range(created_after, created_before)?;

        let page_token = if proto_req.page_token.is_empty() {
            None
        } else {
            Some(parse_uuid(&proto_req.page_token, "page_token")?)
        };

        let resp = self
            .service
            .list_keys(key_service::ListKeysRequest {
                requester,
                page_size: Some(i64::from(page_size)),
                page_token,
                tag_filters: proto_req.tag_filters,
                created_after,
                created_before,
            })
            .await
            .map_err(IntoStatus::into_status)?;

        Ok(Response::new(polykey::ListKeysResponse {
            keys: resp.keys.iter().map(key_metadata_to_proto).collect(),
            next_page_token: resp.next_page_token.unwrap_or_default(),
            total_count: resp.total_count,
            filtered_count: resp.filtered_count,
            response_timestamp: Some(to_prost_timestamp(resp.response_timestamp)),
        }))
    }

    async fn rotate_key(&self, request: Request<polykey::RotateKeyRequest>) -> Result<Response<polykey::RotateKeyResponse>, Status> {
        let requester = self.enter(&request, "RotateKey")?;
        let proto_req = request.into_inner();
        validate::validate_size_budget(proto_req.encoded_len())?;
        let key_id = parse_uuid(&proto_req.key_id, "key_id")?;

        let resp = self
            .service
            .rotate_key(key_service::RotateKeyRequest {
                requester,
                key_id,
                grace_period_seconds: proto_req.grace_period_seconds,
            })
            .await
            .map_err(IntoStatus::into_status)?;

        Ok(Response::new(polykey::RotateKeyResponse {
            key_id: resp.key_id.to_string(),
            new_version: resp.new_version,
            previous_version: resp.previous_version,
            new_key_material: Some(key_material_to_proto(&resp.new_key_material)),
            metadata: Some(key_metadata_to_proto(&resp.metadata)),
            rotation_timestamp: Some(to_prost_timestamp(resp.rotation_timestamp)),
            old_version_expires_at: Some(to_prost_timestamp(resp.old_version_expires_at)),
        }))
    }

    async fn revoke_key(&self, request: Request<polykey::RevokeKeyRequest>) -> Result<Response<polykey::RevokeKeyResponse>, Status> {
        let requester = self.enter(&request, "RevokeKey")?;
        let proto_req = request.into_inner();
        validate::validate_size_budget(proto_req.encoded_len())?;
        let key_id = parse_uuid(&proto_req.key_id, "key_id")?;

        self.service
            .revoke_key(key_service::RevokeKeyRequest {
                requester,
                key_id,
                revocation_reason: (!proto_req.revocation_reason.is_empty()).then_some(proto_req.revocation_reason),
            })
            .await
            .map_err(IntoStatus::into_status)?;

        Ok(Response::new(polykey::RevokeKeyResponse {}))
    }

    async fn update_key_metadata(
        &self,
        request: Request<polykey::UpdateKeyMetadataRequest>,
    ) -> Result<Response<polykey::UpdateKeyMetadataResponse>, Status> {
        let requester = self.enter(&request, "UpdateKeyMetadata")?;
        let proto_req = request.into_inner();
        validate::validate_size_budget(proto_req.encoded_len())?;
        let key_id = parse_uuid(&proto_req.key_id, "key_id")?;

        if let Some(description) = &proto_req.description {
            validate::validate_description(description)?;
        }
        validate::validate_tags(&proto_req.tags_to_add)?;
        validate::validate_authorized_contexts(&proto_req.contexts_to_add)?;
        validate::validate_access_policies(&proto_req.policies_to_update)?;

        let mut domain_req = key_service::UpdateKeyMetadataRequest::new(requester, key_id);
        domain_req.description = proto_req.description;
        domain_req.expires_at = from_prost_timestamp(proto_req.expires_at);
        domain_req.data_classification = proto_req.data_classification.and_then(data_classification_from_proto);
        domain_req.tags_to_add = proto_req.tags_to_add;
        domain_req.tags_to_remove = proto_req.tags_to_remove;
        domain_req.contexts_to_add = proto_req.contexts_to_add;
        domain_req.contexts_to_remove = proto_req.contexts_to_remove;
        domain_req.policies_to_update = proto_req.policies_to_update;

        self.service.update_key_metadata(domain_req).await.map_err(IntoStatus::into_status)?;
        Ok(Response::new(polykey::UpdateKeyMetadataResponse {}))
    }

    async fn batch_get_keys(
        &self,
        request: Request<polykey::BatchGetKeysRequest>,
    ) -> Result<Response<polykey::BatchGetKeysResponse>, Status> {
        let requester = self.enter(&request, "BatchGetKeys")?;
        let proto_req = request.into_inner();
        validate::validate_size_budget(proto_req.encoded_len())?;
        let key_ids = proto_req
            .key_ids
            .iter()
            .map(|id| parse_uuid(id, "key_ids"))
            .collect::<Result<Vec<_>, _>>()?;

        let resp = self
            .service
            .batch_get_keys(key_service::BatchGetKeysRequest {
                requester,
                key_ids,
                continue_on_error: proto_req.continue_on_error,
            })
            .await
            .map_err(IntoStatus::into_status)?;

        Ok(Response::new(polykey::BatchGetKeysResponse {
            results: resp.results.into_iter().map(outcome_to_get_key_result).collect(),
            successful_count: resp.successful_count as u32,
            failed_count: resp.failed_count as u32,
        }))
    }

    async fn batch_get_key_metadata(
        &self,
        request: Request<polykey::BatchGetKeyMetadataRequest>,
    ) -> Result<Response<polykey::BatchGetKeyMetadataResponse>, Status> {
        let requester = self.enter(&request, "BatchGetKeyMetadata")?;
        let proto_req = request.into_inner();
        validate::validate_size_budget(proto_req.encoded_len())?;
        let key_ids = proto_req
            .key_ids
            .iter()
            .map(|id| parse_uuid(id, "key_ids"))
            .collect::<Result<Vec<_>, _>>()?;

        let resp = self
            .service
            .batch_get_key_metadata(key_service::BatchGetKeyMetadataRequest {
                requester,
                key_ids,
                continue_on_error: proto_req.continue_on_error,
            })
            .await
            .map_err(IntoStatus::into_status)?;

        Ok(Response::new(polykey::BatchGetKeyMetadataResponse {
            results: resp.results.into_iter().map(outcome_to_get_key_metadata_result).collect(),
            successful_count: resp.successful_count as u32,
            failed_count: resp.failed_count as u32,
        }))
    }

    async fn batch_create_keys(
        &self,
        request: Request<polykey::BatchCreateKeysRequest>,
    ) -> Result<Response<polykey::BatchCreateKeysResponse>, Status> {
        let requester = self.enter(&request, "BatchCreateKeys")?;
        let proto_req = request.into_inner();
        validate::validate_size_budget(proto_req.encoded_len())?;

        let mut items = Vec::with_capacity(proto_req.items.len());
        for item in proto_req.items {
            if let Some(classification) = data_classification_from_proto(item.data_classification) {
                self.chain.authorizer().check_create(requester.tier, classification)?;
            }
            items.push(create_key_request_from_proto(requester.clone(), item)?);
        }

        let resp = self
            .service
            .batch_create_keys(key_service::BatchCreateKeysRequest {
                requester,
                items,
                continue_on_error: proto_req.continue_on_error,
            })
            .await
            .map_err(IntoStatus::into_status)?;

        Ok(Response::new(polykey::BatchCreateKeysResponse {
            results: resp.results.into_iter().map(outcome_to_create_key_result).collect(),
            successful_count: resp.successful_count as u32,
            failed_count: resp.failed_count as u32,
        }))
    }
}
