mod test_session_cache;
