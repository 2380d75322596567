mod test_app_state;
mod test_auth_middleware;
